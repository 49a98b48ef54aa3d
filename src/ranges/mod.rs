//! Genomic segments, strands, and multi-segment chains.
//!
//! A [`GenomicSegment`] is a 0-indexed, right-exclusive range on one strand of
//! one chromosome. A [`SegmentChain`] is an ordered set of segments on the same
//! chromosome and strand, e.g. the exons of a spliced transcript.

use std::fmt;
use std::str::FromStr;

use crate::{error::GenomeArrayError, Position};

pub mod alignment;

pub use alignment::AlignedRead;

/// Nucleotide strand.
///
/// Strand is a separate axis of a genome array, not a sign on the value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    #[default]
    Plus,
    Minus,
    Unstranded,
}

impl Strand {
    /// The strands of a mutable array unless configured otherwise.
    pub const DEFAULT: [Strand; 2] = [Strand::Plus, Strand::Minus];

    /// The strands of an alignment-backed array.
    pub const ALL: [Strand; 3] = [Strand::Plus, Strand::Minus, Strand::Unstranded];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Plus => "+",
            Strand::Minus => "-",
            Strand::Unstranded => ".",
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Strand::Minus)
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strand {
    type Err = GenomeArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Plus),
            "-" => Ok(Strand::Minus),
            "." => Ok(Strand::Unstranded),
            _ => Err(GenomeArrayError::InvalidStrand(s.to_string())),
        }
    }
}

/// Format a set of strands as e.g. `"+,-"` for messages.
pub fn format_strands(strands: &[Strand]) -> String {
    strands
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// A half-open genomic interval on one strand of a chromosome.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenomicSegment {
    pub chrom: String,
    pub start: Position,
    pub end: Position,
    pub strand: Strand,
}

impl GenomicSegment {
    /// Create a new segment, checking that `start <= end`.
    pub fn new(
        chrom: impl Into<String>,
        start: Position,
        end: Position,
        strand: Strand,
    ) -> Result<Self, GenomeArrayError> {
        if start > end {
            return Err(GenomeArrayError::InvalidGenomicRange(start, end));
        }
        Ok(Self {
            chrom: chrom.into(),
            start,
            end,
            strand,
        })
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `position` falls inside this segment.
    pub fn contains(&self, position: Position) -> bool {
        position >= self.start && position < self.end
    }
}

impl fmt::Display for GenomicSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}({})", self.chrom, self.start, self.end, self.strand)
    }
}

/// A chain of non-overlapping segments on one chromosome and strand, e.g. a
/// spliced transcript. Segments are kept sorted by genomic start.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentChain {
    segments: Vec<GenomicSegment>,
}

impl SegmentChain {
    pub fn new(mut segments: Vec<GenomicSegment>) -> Result<Self, GenomeArrayError> {
        let first = segments.first().ok_or(GenomeArrayError::EmptySegmentChain)?;
        let (chrom, strand) = (first.chrom.clone(), first.strand);
        if let Some(bad) = segments
            .iter()
            .find(|s| s.chrom != chrom || s.strand != strand)
        {
            return Err(GenomeArrayError::InconsistentSegmentChain(bad.to_string()));
        }
        segments.sort_by_key(|s| s.start);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[GenomicSegment] {
        &self.segments
    }

    pub fn chrom(&self) -> &str {
        &self.segments[0].chrom
    }

    pub fn strand(&self) -> Strand {
        self.segments[0].strand
    }

    /// Total length of all segments (spliced length).
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The smallest segment covering every segment in the chain.
    pub fn spanning_segment(&self) -> GenomicSegment {
        let start = self.segments.iter().map(|s| s.start).min().unwrap_or(0);
        let end = self.segments.iter().map(|s| s.end).max().unwrap_or(0);
        GenomicSegment {
            chrom: self.chrom().to_string(),
            start,
            end,
            strand: self.strand(),
        }
    }
}

impl From<GenomicSegment> for SegmentChain {
    fn from(segment: GenomicSegment) -> Self {
        Self {
            segments: vec![segment],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strand_parse() {
        assert_eq!("+".parse::<Strand>().unwrap(), Strand::Plus);
        assert_eq!("-".parse::<Strand>().unwrap(), Strand::Minus);
        assert_eq!(".".parse::<Strand>().unwrap(), Strand::Unstranded);
        assert!(matches!(
            "x".parse::<Strand>(),
            Err(GenomeArrayError::InvalidStrand(_))
        ));
    }

    #[test]
    fn test_segment_new_rejects_inverted() {
        assert!(GenomicSegment::new("chr1", 10, 5, Strand::Plus).is_err());
        let seg = GenomicSegment::new("chr1", 5, 10, Strand::Minus).unwrap();
        assert_eq!(seg.len(), 5);
        assert_eq!(seg.to_string(), "chr1:5-10(-)");
    }

    #[test]
    fn test_chain_sorted_and_spanning() {
        let chain = SegmentChain::new(vec![
            GenomicSegment::new("chr1", 50, 60, Strand::Minus).unwrap(),
            GenomicSegment::new("chr1", 10, 20, Strand::Minus).unwrap(),
        ])
        .unwrap();
        assert_eq!(chain.segments()[0].start, 10);
        assert_eq!(chain.len(), 20);
        let span = chain.spanning_segment();
        assert_eq!((span.start, span.end), (10, 60));
    }

    #[test]
    fn test_chain_rejects_mixed_strands() {
        let result = SegmentChain::new(vec![
            GenomicSegment::new("chr1", 50, 60, Strand::Minus).unwrap(),
            GenomicSegment::new("chr1", 10, 20, Strand::Plus).unwrap(),
        ]);
        assert!(matches!(
            result,
            Err(GenomeArrayError::InconsistentSegmentChain(_))
        ));
        assert!(SegmentChain::new(Vec::new()).is_err());
    }
}
