//! Read alignment records as handed over by alignment readers.

use crate::{ranges::GenomicSegment, ranges::Strand, Position};

/// A read alignment on the reference.
///
/// `blocks` are the half-open reference intervals covered by aligned bases
/// (CIGAR `M`, `=`, and `X` operations), in increasing order. Deletions and
/// introns separate blocks; insertions and clips do not appear on the reference.
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedRead {
    pub name: String,
    pub chrom: String,
    pub blocks: Vec<(Position, Position)>,
    pub is_reverse: bool,
    /// Length of the read sequence, including clipped bases.
    pub query_length: usize,
}

impl AlignedRead {
    /// Create an ungapped alignment covering `[start, end)`.
    pub fn ungapped(
        name: impl Into<String>,
        chrom: impl Into<String>,
        start: Position,
        end: Position,
        is_reverse: bool,
    ) -> Self {
        Self {
            name: name.into(),
            chrom: chrom.into(),
            blocks: vec![(start, end)],
            is_reverse,
            query_length: (end - start) as usize,
        }
    }

    pub fn start(&self) -> Position {
        self.blocks.first().map_or(0, |b| b.0)
    }

    pub fn end(&self) -> Position {
        self.blocks.last().map_or(0, |b| b.1)
    }

    pub fn strand(&self) -> Strand {
        if self.is_reverse {
            Strand::Minus
        } else {
            Strand::Plus
        }
    }

    /// Reference positions of every aligned base, in increasing genomic order.
    pub fn positions(&self) -> Vec<Position> {
        self.blocks.iter().flat_map(|&(s, e)| s..e).collect()
    }

    /// Number of aligned reference positions.
    pub fn aligned_length(&self) -> usize {
        self.blocks.iter().map(|&(s, e)| (e - s) as usize).sum()
    }

    pub fn spanning_segment(&self) -> GenomicSegment {
        GenomicSegment {
            chrom: self.chrom.clone(),
            start: self.start(),
            end: self.end(),
            strand: self.strand(),
        }
    }
}
