//! An immutable genome array over BigWig signal files.

use std::path::PathBuf;

use indexmap::IndexMap;
use log::warn;
use ndarray::{s, Array1};

use crate::{
    error::GenomeArrayError,
    io::bigwig::BigWigSource,
    ranges::{format_strands, GenomicSegment, Strand},
    traits::{GenomeArray, SignalSource},
    Position,
};

/// A read-only genome array summing signal files per strand.
///
/// Sources are attached to a strand with
/// [`BigWigGenomeArray::add_from_bigwig`]; a query sums every source on its
/// strand. Querying a strand with no sources yields zeros and a warning.
pub struct BigWigGenomeArray<S: SignalSource> {
    sources: IndexMap<Strand, Vec<S>>,
    fill: f64,
    sum: Option<f64>,
    normalize: bool,
}

impl<S: SignalSource> Default for BigWigGenomeArray<S> {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl<S: SignalSource> BigWigGenomeArray<S> {
    /// Create an empty array. `fill` is the value reported where a file has
    /// no data; it is handed to sources opened by the array.
    pub fn new(fill: f64) -> Self {
        Self {
            sources: IndexMap::new(),
            fill,
            sum: None,
            normalize: false,
        }
    }

    /// Attach `source` to `strand`.
    pub fn add_from_bigwig(&mut self, source: S, strand: Strand) {
        self.sources.entry(strand).or_default().push(source);
        self.sum = None;
    }
}

impl BigWigGenomeArray<BigWigSource> {
    /// Open the BigWig file at `path` with this array's fill value and
    /// attach it to `strand`.
    pub fn add_from_path(
        &mut self,
        path: impl Into<PathBuf>,
        strand: Strand,
    ) -> Result<(), GenomeArrayError> {
        let source = BigWigSource::open(path, self.fill)?;
        self.add_from_bigwig(source, strand);
        Ok(())
    }
}

impl<S: SignalSource> GenomeArray for BigWigGenomeArray<S> {
    fn get_with_order(
        &mut self,
        segment: &GenomicSegment,
        roi_order: bool,
    ) -> Result<Array1<f64>, GenomeArrayError> {
        let mut values = Array1::zeros(segment.len());
        match self.sources.get_mut(&segment.strand) {
            Some(sources) => {
                for source in sources.iter_mut() {
                    values += &source.values(&segment.chrom, segment.start, segment.end)?;
                }
            }
            None => {
                let strands: Vec<Strand> = self.sources.keys().copied().collect();
                warn!(
                    "Strand '{}' not in BigWigGenomeArray (has {}).",
                    segment.strand,
                    format_strands(&strands)
                );
            }
        }
        if self.normalize {
            let total = self.sum()?;
            values.mapv_inplace(|v| v / total * 1e6);
        }
        if roi_order && segment.strand.is_reverse() {
            values = values.slice(s![..;-1]).to_owned();
        }
        Ok(values)
    }

    fn sum(&mut self) -> Result<f64, GenomeArrayError> {
        if let Some(total) = self.sum {
            return Ok(total);
        }
        let mut total = 0.0;
        for source in self.sources.values_mut().flatten() {
            total += source.total()?;
        }
        self.sum = Some(total);
        Ok(total)
    }

    fn reset_sum(&mut self) {
        self.sum = None;
    }

    fn set_sum(&mut self, value: f64) {
        self.sum = Some(value);
    }

    fn set_normalize(&mut self, value: bool) {
        self.normalize = value;
    }

    fn is_normalized(&self) -> bool {
        self.normalize
    }

    fn chroms(&self) -> Vec<String> {
        self.lengths().keys().cloned().collect()
    }

    /// Strands with at least one source, sorted.
    fn strands(&self) -> Vec<Strand> {
        let mut strands: Vec<Strand> = self.sources.keys().copied().collect();
        strands.sort();
        strands
    }

    fn lengths(&self) -> IndexMap<String, Position> {
        let mut lengths: IndexMap<String, Position> = IndexMap::new();
        for source in self.sources.values().flatten() {
            for (chrom, length) in source.chrom_lengths() {
                let entry = lengths.entry(chrom).or_insert(0);
                *entry = (*entry).max(length);
            }
        }
        lengths
    }
}
