//! # genomearray: per-nucleotide count and signal arrays
//!
//! A *genome array* maps a number to every nucleotide position of a genome,
//! separately for each strand. Values are fetched with a [`GenomicSegment`]
//! and come back as an [`ndarray::Array1<f64>`] ordered 5' to 3' relative to
//! the segment, so minus-strand segments are reported back-to-front.
//!
//! Four backends share the [`GenomeArray`] trait:
//!
//!  - [`DenseGenomeArray`]: one contiguous buffer per chromosome and strand,
//!    mutable and automatically grown.
//!  - [`SparseGenomeArray`]: the same, backed by sparse vectors; smaller, slower.
//!  - [`BamGenomeArray`]: an immutable view over indexed BAM files that maps
//!    read alignments to counts on every query, under a swappable mapping rule.
//!  - [`BigWigGenomeArray`]: an immutable view over BigWig files.
//!
//! [`GenomicSegment`]: crate::ranges::GenomicSegment
//! [`GenomeArray`]: crate::traits::GenomeArray
//! [`DenseGenomeArray`]: crate::arrays::dense::DenseGenomeArray
//! [`SparseGenomeArray`]: crate::arrays::sparse::SparseGenomeArray
//! [`BamGenomeArray`]: crate::arrays::bam::BamGenomeArray
//! [`BigWigGenomeArray`]: crate::arrays::bigwig::BigWigGenomeArray

pub use indexmap;

pub mod arrays;
pub mod commands;
pub mod error;
pub mod io;
pub mod macros;
pub mod mapping;
pub mod ranges;
pub mod reporting;
pub mod test_utilities;
pub mod traits;

/// Genomic coordinates, 0-based.
pub type Position = u32;

/// A signed shift applied to a [`Position`].
pub type PositionOffset = i64;

/// Minimum size allocated for a chromosome whose length is not known ahead of time.
pub const MIN_CHR_SIZE: usize = 10_000_000;

/// Slack added to a buffer when an access runs past its end.
pub const GROWTH_MARGIN: usize = 10_000;

pub mod prelude {
    pub use crate::arrays::bam::BamGenomeArray;
    pub use crate::arrays::bigwig::BigWigGenomeArray;
    pub use crate::arrays::dense::{DenseBuffer, DenseGenomeArray};
    pub use crate::arrays::sparse::{SparseBuffer, SparseGenomeArray};
    pub use crate::arrays::{ArrayConfig, CombineMode, Operand, StrandedArray, Values};
    pub use crate::error::GenomeArrayError;
    pub use crate::io::file::read_seqlens;
    pub use crate::mapping::{MapParams, Offset, OffsetTable};
    pub use crate::ranges::{GenomicSegment, SegmentChain, Strand};
    pub use crate::seqlens;
    pub use crate::traits::{
        AlignmentSource, GenomeArray, MutableGenomeArray, SignalSource, StrandBuffer,
    };
    pub use crate::Position;
}
