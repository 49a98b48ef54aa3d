//! Mapping rules: turning one ungapped alignment into `(segment, weight)`
//! contributions to a genome array.
//!
//! Each rule is a plain function with the [`MapRule`] signature, so it can be
//! handed to [`MutableGenomeArray`] import routines directly. The rules for
//! alignment-backed arrays, which work over many reads at once, live in
//! [`factories`].
//!
//! [`MutableGenomeArray`]: crate::traits::MutableGenomeArray

use std::path::PathBuf;
use std::str::FromStr;

use indexmap::IndexMap;
use log::warn;

use crate::{
    error::GenomeArrayError,
    io::file::InputFile,
    ranges::{GenomicSegment, Strand},
    Position, PositionOffset,
};

pub mod factories;

/// Shortest alignment counted by the import routines unless told otherwise.
pub const DEFAULT_MIN_LENGTH: usize = 25;

/// A mapping rule over an ungapped alignment.
pub type MapRule = fn(&GenomicSegment, &MapParams) -> Vec<(GenomicSegment, f64)>;

/// Offsets keyed by alignment length, with an optional fallback.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OffsetTable {
    pub table: IndexMap<usize, PositionOffset>,
    pub default: Option<PositionOffset>,
}

impl OffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the offset for alignments of `length`.
    pub fn insert(&mut self, length: usize, offset: PositionOffset) {
        self.table.insert(length, offset);
    }

    pub fn with_default(mut self, offset: PositionOffset) -> Self {
        self.default = Some(offset);
        self
    }

    /// The offset for alignments of `length`, falling back to the default.
    pub fn lookup(&self, length: usize) -> Option<PositionOffset> {
        self.table.get(&length).copied().or(self.default)
    }

    /// Read a two-column, tab-delimited offset file: an alignment length (or
    /// the word `default`) and an offset. Lines starting with `#` are skipped.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, GenomeArrayError> {
        let reader = InputFile::new(path).reader()?;
        let mut table = OffsetTable::new();
        let mut records = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .from_reader(reader);
        for record in records.records() {
            let record = record?;
            let (key, value) = match (record.get(0), record.get(1)) {
                (Some(key), Some(value)) => (key, value),
                _ => {
                    return Err(GenomeArrayError::InvalidOffsetEntry(
                        record.iter().collect::<Vec<_>>().join("\t"),
                    ))
                }
            };
            table.parse_entry(key.trim(), value.trim())?;
        }
        Ok(table)
    }

    fn parse_entry(&mut self, key: &str, value: &str) -> Result<(), GenomeArrayError> {
        let bad_entry = || GenomeArrayError::InvalidOffsetEntry(format!("{}:{}", key, value));
        let offset: PositionOffset = value.parse().map_err(|_| bad_entry())?;
        if key == "default" {
            self.default = Some(offset);
        } else {
            let length: usize = key.parse().map_err(|_| bad_entry())?;
            self.insert(length, offset);
        }
        Ok(())
    }
}

/// Parse a comma-separated list like `"28:12,29:12,default:13"`.
impl FromStr for OffsetTable {
    type Err = GenomeArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut table = OffsetTable::new();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once(':')
                .ok_or_else(|| GenomeArrayError::InvalidOffsetEntry(entry.to_string()))?;
            table.parse_entry(key.trim(), value.trim())?;
        }
        Ok(table)
    }
}

/// A mapping offset, either the same for every alignment or looked up by
/// alignment length.
#[derive(Clone, Debug, PartialEq)]
pub enum Offset {
    Fixed(PositionOffset),
    ByLength(OffsetTable),
}

impl Default for Offset {
    fn default() -> Self {
        Offset::Fixed(0)
    }
}

impl Offset {
    pub fn lookup(&self, length: usize) -> Option<PositionOffset> {
        match self {
            Offset::Fixed(offset) => Some(*offset),
            Offset::ByLength(table) => table.lookup(length),
        }
    }
}

/// Parameters shared by the mapping rules.
#[derive(Clone, Debug, PartialEq)]
pub struct MapParams {
    /// Total weight contributed by one alignment.
    pub value: f64,
    pub offset: Offset,
    /// Positions trimmed from each end before center mapping.
    pub nibble: usize,
}

impl Default for MapParams {
    fn default() -> Self {
        Self {
            value: 1.0,
            offset: Offset::default(),
            nibble: 0,
        }
    }
}

impl MapParams {
    pub fn with_offset(offset: PositionOffset) -> Self {
        Self {
            offset: Offset::Fixed(offset),
            ..Self::default()
        }
    }

    pub fn with_table(table: OffsetTable) -> Self {
        Self {
            offset: Offset::ByLength(table),
            ..Self::default()
        }
    }

    pub fn with_nibble(nibble: usize) -> Self {
        Self {
            nibble,
            ..Self::default()
        }
    }
}

/// A single-position segment at `position`, or `None` (with a warning) if
/// the position falls before the chromosome start.
fn point_segment(
    alignment: &GenomicSegment,
    position: PositionOffset,
) -> Option<GenomicSegment> {
    if position < 0 || position >= Position::MAX as PositionOffset {
        warn!(
            "Mapped position {} of alignment {} is off the chromosome. Ignoring.",
            position, alignment
        );
        return None;
    }
    let position = position as Position;
    Some(GenomicSegment {
        chrom: alignment.chrom.clone(),
        start: position,
        end: position + 1,
        strand: alignment.strand,
    })
}

/// The position `offset` nucleotides 3' of the alignment's 5' end.
fn from_five_prime(alignment: &GenomicSegment, offset: PositionOffset) -> PositionOffset {
    match alignment.strand {
        Strand::Plus | Strand::Unstranded => alignment.start as PositionOffset + offset,
        Strand::Minus => alignment.end as PositionOffset - 1 - offset,
    }
}

/// The position `offset` nucleotides 5' of the alignment's 3' end.
fn from_three_prime(alignment: &GenomicSegment, offset: PositionOffset) -> PositionOffset {
    match alignment.strand {
        Strand::Plus | Strand::Unstranded => alignment.end as PositionOffset - 1 - offset,
        Strand::Minus => alignment.start as PositionOffset + offset,
    }
}

fn fixed_offset(alignment: &GenomicSegment, params: &MapParams) -> Option<PositionOffset> {
    let offset = params.offset.lookup(alignment.len());
    if offset.is_none() {
        warn!(
            "No offset for alignments of length {}. Ignoring.",
            alignment.len()
        );
    }
    offset
}

/// Map each alignment to a single position, `offset` nucleotides from its
/// 5' end toward its 3' end.
pub fn five_prime_map(
    alignment: &GenomicSegment,
    params: &MapParams,
) -> Vec<(GenomicSegment, f64)> {
    let Some(offset) = fixed_offset(alignment, params) else {
        return Vec::new();
    };
    if offset > alignment.len() as PositionOffset {
        warn!(
            "Alignment shorter ({} nt) than offset ({} nt). Ignoring.",
            alignment.len(),
            offset
        );
        return Vec::new();
    }
    point_segment(alignment, from_five_prime(alignment, offset))
        .map(|seg| vec![(seg, params.value)])
        .unwrap_or_default()
}

/// Map each alignment to a single position, `offset` nucleotides from its
/// 3' end toward its 5' end.
pub fn three_prime_map(
    alignment: &GenomicSegment,
    params: &MapParams,
) -> Vec<(GenomicSegment, f64)> {
    let Some(offset) = fixed_offset(alignment, params) else {
        return Vec::new();
    };
    if offset > alignment.len() as PositionOffset {
        warn!(
            "Alignment shorter ({} nt) than offset ({} nt). Ignoring.",
            alignment.len(),
            offset
        );
        return Vec::new();
    }
    point_segment(alignment, from_three_prime(alignment, offset))
        .map(|seg| vec![(seg, params.value)])
        .unwrap_or_default()
}

/// Map each alignment to a single position from its 5' end, using an offset
/// chosen by alignment length.
///
/// An offset at least as long as the alignment is reported but still mapped,
/// so the position may fall outside the alignment.
pub fn variable_five_prime_map(
    alignment: &GenomicSegment,
    params: &MapParams,
) -> Vec<(GenomicSegment, f64)> {
    let length = alignment.len();
    let Some(offset) = params.offset.lookup(length) else {
        warn!("No offset for reads of length {}. Ignoring.", length);
        return Vec::new();
    };
    if offset >= length as PositionOffset {
        warn!(
            "Offset ({} nt) longer than read length {}.",
            offset, length
        );
    }
    point_segment(alignment, from_five_prime(alignment, offset))
        .map(|seg| vec![(seg, params.value)])
        .unwrap_or_default()
}

/// Trim `nibble` positions from each end and spread the value evenly over
/// the `N` remaining positions, each receiving `value / N`. The remaining
/// segment is shifted `offset` nucleotides in the 3' direction.
pub fn center_map(alignment: &GenomicSegment, params: &MapParams) -> Vec<(GenomicSegment, f64)> {
    let length = alignment.len();
    let nibble = params.nibble;
    if length <= 2 * nibble {
        warn!(
            "Alignment shorter ({} nt) than 2 * nibble ({} nt). Ignoring.",
            length,
            2 * nibble
        );
        return Vec::new();
    }
    let Some(offset) = fixed_offset(alignment, params) else {
        return Vec::new();
    };
    let shift = if alignment.strand.is_reverse() {
        -offset
    } else {
        offset
    };
    let start = alignment.start as PositionOffset + nibble as PositionOffset + shift;
    let end = alignment.end as PositionOffset - nibble as PositionOffset + shift;
    if start < 0 {
        warn!(
            "Center-mapped alignment {} is shifted off the chromosome. Ignoring.",
            alignment
        );
        return Vec::new();
    }
    let segment = GenomicSegment {
        chrom: alignment.chrom.clone(),
        start: start as Position,
        end: end as Position,
        strand: alignment.strand,
    };
    let density = params.value / segment.len() as f64;
    vec![(segment, density)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: Position, end: Position, strand: Strand) -> GenomicSegment {
        GenomicSegment::new("chrA", start, end, strand).unwrap()
    }

    fn positions(mapped: &[(GenomicSegment, f64)]) -> Vec<(Position, Position)> {
        mapped.iter().map(|(s, _)| (s.start, s.end)).collect()
    }

    #[test]
    fn test_five_prime_map_strands() {
        let params = MapParams::with_offset(3);
        let plus = five_prime_map(&seg(100, 130, Strand::Plus), &params);
        assert_eq!(positions(&plus), vec![(103, 104)]);
        let minus = five_prime_map(&seg(100, 130, Strand::Minus), &params);
        assert_eq!(positions(&minus), vec![(126, 127)]);
        let unstranded = five_prime_map(&seg(100, 130, Strand::Unstranded), &params);
        assert_eq!(positions(&unstranded), vec![(103, 104)]);
        assert_eq!(plus[0].1, 1.0);
    }

    #[test]
    fn test_three_prime_map_strands() {
        let params = MapParams::with_offset(2);
        let plus = three_prime_map(&seg(100, 130, Strand::Plus), &params);
        assert_eq!(positions(&plus), vec![(127, 128)]);
        let minus = three_prime_map(&seg(100, 130, Strand::Minus), &params);
        assert_eq!(positions(&minus), vec![(102, 103)]);
    }

    #[test]
    fn test_offset_longer_than_read_discarded() {
        let params = MapParams::with_offset(31);
        assert!(five_prime_map(&seg(100, 130, Strand::Plus), &params).is_empty());
        assert!(three_prime_map(&seg(100, 130, Strand::Minus), &params).is_empty());
        // equal to the length is still mapped
        let params = MapParams::with_offset(30);
        assert_eq!(
            positions(&five_prime_map(&seg(100, 130, Strand::Plus), &params)),
            vec![(130, 131)]
        );
    }

    #[test]
    fn test_variable_five_prime_map() {
        let table: OffsetTable = "30:12,31:13".parse().unwrap();
        let params = MapParams::with_table(table.clone());
        let mapped = variable_five_prime_map(&seg(100, 130, Strand::Plus), &params);
        assert_eq!(positions(&mapped), vec![(112, 113)]);
        let mapped = variable_five_prime_map(&seg(100, 131, Strand::Minus), &params);
        assert_eq!(positions(&mapped), vec![(117, 118)]);

        // no entry, no default
        assert!(variable_five_prime_map(&seg(100, 125, Strand::Plus), &params).is_empty());

        // falls back to the default
        let params = MapParams::with_table(table.with_default(5));
        let mapped = variable_five_prime_map(&seg(100, 125, Strand::Plus), &params);
        assert_eq!(positions(&mapped), vec![(105, 106)]);
    }

    #[test]
    fn test_variable_five_prime_offset_past_end_kept() {
        let table: OffsetTable = "10:12".parse().unwrap();
        let params = MapParams::with_table(table);
        let mapped = variable_five_prime_map(&seg(100, 110, Strand::Plus), &params);
        assert_eq!(positions(&mapped), vec![(112, 113)]);
        // would land before position 0 on the minus strand
        let mapped = variable_five_prime_map(&seg(0, 10, Strand::Minus), &params);
        assert!(mapped.is_empty());
    }

    #[test]
    fn test_center_map() {
        let params = MapParams::with_nibble(5);
        let mapped = center_map(&seg(100, 130, Strand::Plus), &params);
        assert_eq!(positions(&mapped), vec![(105, 125)]);
        assert!((mapped[0].1 - 1.0 / 20.0).abs() < 1e-12);

        let params = MapParams {
            nibble: 5,
            offset: Offset::Fixed(2),
            value: 4.0,
        };
        let mapped = center_map(&seg(100, 130, Strand::Minus), &params);
        assert_eq!(positions(&mapped), vec![(103, 123)]);
        assert!((mapped[0].1 - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_center_map_too_short() {
        let params = MapParams::with_nibble(5);
        assert!(center_map(&seg(100, 110, Strand::Plus), &params).is_empty());
        assert_eq!(center_map(&seg(100, 111, Strand::Plus), &params).len(), 1);
    }

    #[test]
    fn test_offset_table_parse() {
        let table: OffsetTable = "28:12, 29:13,default:14".parse().unwrap();
        assert_eq!(table.lookup(28), Some(12));
        assert_eq!(table.lookup(29), Some(13));
        assert_eq!(table.lookup(40), Some(14));
        assert!(matches!(
            "28-12".parse::<OffsetTable>(),
            Err(GenomeArrayError::InvalidOffsetEntry(_))
        ));
        assert!("abc:12".parse::<OffsetTable>().is_err());
    }
}
