/// Create an [`IndexMap`] of sequence names and their lengths.
///
/// # Example
///
/// ```
/// use genomearray::prelude::*;
///
/// let sl = seqlens!("chr1" => 100, "chr2" => 250);
/// assert_eq!(sl.get("chr2"), Some(&250));
/// ```
///
/// [`IndexMap`]: indexmap::IndexMap
#[macro_export]
macro_rules! seqlens {
    ($($key:expr => $value:expr),* $(,)?) => {
        $crate::indexmap::IndexMap::<String, $crate::Position>::from_iter(vec![
            $(($key.to_string(), $value)),*
        ])
    };
}

/// Like [`assert_eq!`], but only for internal invariants: failing it
/// indicates a bug in this library, not in the caller's input.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    panic!(
                        "{}\nExpected `{}` but found `{}`.",
                        "Internal error: please report.", stringify!($left), stringify!($right),
                    );
                }
            }
        }
    };
}
