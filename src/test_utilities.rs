//! Test cases and test utility functions.
//!

use std::io::Write;

use indexmap::IndexMap;
use ndarray::{s, Array1};
use rand::{thread_rng, Rng};
use tempfile::NamedTempFile;

use crate::{
    error::GenomeArrayError,
    ranges::{AlignedRead, GenomicSegment, Strand},
    traits::{AlignmentSource, SignalSource},
    Position,
};

// Stochastic test segment defaults
//
// This is the random number of segments to use in tests.
// The tradeoff is catching stochastic errors vs test time.
pub const NRANDOM_SEGMENTS: usize = 1000;

// segment length
pub const MIN_LEN: Position = 1;
pub const MAX_LEN: Position = 500;

// number of chromosome sequences
pub const NCHROM: usize = 4;

// chromosome sizes
pub const MIN_CHROM_LEN: Position = 10_000;
pub const MAX_CHROM_LEN: Position = 50_000;

/// Build a random range start/end on a sequence of `chrom_len`.
/// 0-indexed, right exclusive
pub fn random_range(chrom_len: Position) -> (Position, Position) {
    let mut rng = thread_rng();
    let len = rng.gen_range(MIN_LEN..MAX_LEN.min(chrom_len));
    let start = rng.gen_range(0..chrom_len - len + 1);
    (start, start + len)
}

/// Build random sequence lengths
pub fn random_seqlen() -> Position {
    let mut rng = thread_rng();
    rng.gen_range(MIN_CHROM_LEN..=MAX_CHROM_LEN)
}

/// Sample a random chromosome
pub fn random_chrom() -> String {
    let mut rng = thread_rng();
    format!("chr{}", rng.gen_range(1..NCHROM + 1))
}

/// Sample a random strand, `+` or `-`.
pub fn random_strand() -> Strand {
    let mut rng = thread_rng();
    Strand::DEFAULT[rng.gen_range(0..Strand::DEFAULT.len())]
}

/// Build a random stranded [`GenomicSegment`] on a random chromosome of `chrom_len`.
pub fn random_segment(chrom_len: Position) -> GenomicSegment {
    let (start, end) = random_range(chrom_len);
    GenomicSegment {
        chrom: random_chrom(),
        start,
        end,
        strand: random_strand(),
    }
}

/// Build random values to assign over a segment.
pub fn random_values(len: usize) -> Array1<f64> {
    let mut rng = thread_rng();
    Array1::from_iter((0..len).map(|_| rng.gen_range(0..10) as f64))
}

/// Write `contents` to a new temporary file.
pub fn temp_file_with(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("could not create temporary file");
    file.write_all(contents.as_bytes())
        .expect("could not write temporary file");
    file.flush().expect("could not flush temporary file");
    file
}

/// An in-memory [`AlignmentSource`].
#[derive(Clone, Debug, Default)]
pub struct MockAlignments {
    references: Vec<(String, Position)>,
    reads: Vec<AlignedRead>,
    mapped: u64,
}

impl MockAlignments {
    pub fn new(references: Vec<(String, Position)>) -> Self {
        Self {
            references,
            ..Default::default()
        }
    }

    pub fn with_read(mut self, read: AlignedRead) -> Self {
        self.reads.push(read);
        self
    }

    pub fn with_mapped(mut self, mapped: u64) -> Self {
        self.mapped = mapped;
        self
    }
}

impl AlignmentSource for MockAlignments {
    fn references(&self) -> Vec<(String, Position)> {
        self.references.clone()
    }

    fn mapped(&self) -> u64 {
        self.mapped
    }

    fn fetch(
        &mut self,
        chrom: &str,
        start: Position,
        end: Position,
    ) -> Result<Vec<AlignedRead>, GenomeArrayError> {
        Ok(self
            .reads
            .iter()
            .filter(|read| read.chrom == chrom && read.start() < end && read.end() > start)
            .cloned()
            .collect())
    }
}

/// An in-memory [`SignalSource`] holding one chromosome.
#[derive(Clone, Debug)]
pub struct MockSignal {
    chrom: String,
    values: Array1<f64>,
}

impl MockSignal {
    pub fn new(chrom: impl Into<String>, values: Array1<f64>) -> Self {
        Self {
            chrom: chrom.into(),
            values,
        }
    }
}

impl SignalSource for MockSignal {
    fn chrom_lengths(&self) -> IndexMap<String, Position> {
        let mut lengths = IndexMap::new();
        lengths.insert(self.chrom.clone(), self.values.len() as Position);
        lengths
    }

    fn total(&mut self) -> Result<f64, GenomeArrayError> {
        Ok(self.values.sum())
    }

    fn values(
        &mut self,
        chrom: &str,
        start: Position,
        end: Position,
    ) -> Result<Array1<f64>, GenomeArrayError> {
        let mut values = Array1::zeros((end - start) as usize);
        if chrom != self.chrom {
            return Ok(values);
        }
        let start = start as usize;
        let stop = (end as usize).min(self.values.len());
        if start < stop {
            values
                .slice_mut(s![..stop - start])
                .assign(&self.values.slice(s![start..stop]));
        }
        Ok(values)
    }
}
