//! An immutable genome array over read alignments.
//!
//! [`BamGenomeArray`] keeps no counts of its own. Every query fetches the
//! overlapping reads from its [`AlignmentSource`]s, filters them, and runs
//! the current [`MappingFunction`] over them, so the mapping rule and the
//! filters can be changed at any time.

use std::io::Write;

use indexmap::IndexMap;
use log::{debug, info};
use ndarray::{s, Array1};

use crate::{
    arrays::{ArrayConfig, StrandedArray, Values},
    error::GenomeArrayError,
    io::tracks::{write_track_line, BedGraphWriter, VariableStepWriter},
    mapping::factories::{center_mapping, MappingFunction, ReadFilter},
    ranges::{AlignedRead, GenomicSegment, Strand},
    traits::{AlignmentSource, GenomeArray, MutableGenomeArray, StrandBuffer},
    Position,
};

/// Number of positions fetched at a time when sweeping whole chromosomes.
pub const DEFAULT_WINDOW_SIZE: usize = 100_000;

/// A read-only genome array over one or more indexed alignment files.
///
/// Chromosome lengths are the maxima over all sources. The sum defaults to
/// the total number of mapped reads reported by the sources' indices, and
/// is not affected by filters; use [`GenomeArray::set_sum`] to normalize to
/// a filtered total instead.
pub struct BamGenomeArray<S: AlignmentSource> {
    sources: Vec<S>,
    lengths: IndexMap<String, Position>,
    mapping: MappingFunction,
    filters: IndexMap<String, ReadFilter>,
    sum: f64,
    normalize: bool,
}

impl<S: AlignmentSource> BamGenomeArray<S> {
    /// Create an array with the default mapping rule, center mapping without
    /// trimming.
    pub fn new(sources: Vec<S>) -> Self {
        Self::with_mapping(sources, center_mapping(0, 1.0))
    }

    pub fn with_mapping(sources: Vec<S>, mapping: MappingFunction) -> Self {
        let mut lengths: IndexMap<String, Position> = IndexMap::new();
        for source in &sources {
            for (chrom, length) in source.references() {
                let entry = lengths.entry(chrom).or_insert(0);
                *entry = (*entry).max(length);
            }
        }
        let mut array = Self {
            sources,
            lengths,
            mapping,
            filters: IndexMap::new(),
            sum: 0.0,
            normalize: false,
        };
        array.reset_sum();
        array
    }

    /// Replace the mapping rule. The sum is reset to the mapped read total.
    pub fn set_mapping(&mut self, mapping: MappingFunction) {
        debug!("Mapping rule set to {}", mapping.description());
        self.mapping = mapping;
        self.reset_sum();
    }

    /// Description of the current mapping rule.
    pub fn mapping(&self) -> &str {
        self.mapping.description()
    }

    /// Add a read filter, applied after any filters already added. A filter
    /// with the same name is replaced in place.
    pub fn add_filter(&mut self, name: impl Into<String>, filter: ReadFilter) {
        self.filters.insert(name.into(), filter);
    }

    /// Remove and return the filter called `name`.
    pub fn remove_filter(&mut self, name: &str) -> Option<ReadFilter> {
        self.filters.shift_remove(name)
    }

    /// Names of the active filters, in the order they are applied.
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.keys().map(|k| k.as_str()).collect()
    }

    /// Fetch the reads overlapping `segment` and map them to counts.
    ///
    /// Reads are matched to the segment's strand; an unstranded segment
    /// keeps reads from both strands. Counts are normalized if
    /// normalization is on, and reversed for minus-strand segments when
    /// `roi_order` is true.
    pub fn get_reads_and_counts(
        &mut self,
        segment: &GenomicSegment,
        roi_order: bool,
    ) -> Result<(Vec<AlignedRead>, Array1<f64>), GenomeArrayError> {
        if !self.lengths.contains_key(&segment.chrom) {
            return Ok((Vec::new(), Array1::zeros(segment.len())));
        }

        let mut reads = Vec::new();
        for source in self.sources.iter_mut() {
            reads.extend(source.fetch(&segment.chrom, segment.start, segment.end)?);
        }
        let strand = segment.strand;
        reads.retain(|read| match strand {
            Strand::Plus => !read.is_reverse,
            Strand::Minus => read.is_reverse,
            Strand::Unstranded => true,
        });
        for filter in self.filters.values() {
            reads.retain(|read| filter(read));
        }

        let (reads, mut counts) = self.mapping.apply(reads, segment);
        if self.normalize {
            let total = self.sum;
            counts.mapv_inplace(|v| v / total * 1e6);
        }
        if roi_order && strand.is_reverse() {
            counts = counts.slice(s![..;-1]).to_owned();
        }
        Ok((reads, counts))
    }

    /// The reads the current mapping rule uses for `segment`.
    pub fn get_reads(
        &mut self,
        segment: &GenomicSegment,
    ) -> Result<Vec<AlignedRead>, GenomeArrayError> {
        Ok(self.get_reads_and_counts(segment, true)?.0)
    }

    /// Windows of at most `window_size` covering every chromosome, sorted by
    /// chromosome name.
    fn windows(
        &self,
        strand: Strand,
        window_size: usize,
    ) -> Result<Vec<GenomicSegment>, GenomeArrayError> {
        if window_size == 0 {
            return Err(GenomeArrayError::InvalidInput(
                "window size must be positive".to_string(),
            ));
        }
        let mut chroms: Vec<_> = self.lengths.iter().collect();
        chroms.sort_by(|a, b| a.0.cmp(b.0));
        let mut windows = Vec::new();
        for (chrom, &length) in chroms {
            for start in (0..length as usize).step_by(window_size) {
                let end = (start + window_size).min(length as usize);
                windows.push(GenomicSegment::new(
                    chrom.clone(),
                    start as Position,
                    end as Position,
                    strand,
                )?);
            }
        }
        Ok(windows)
    }

    /// Count every chromosome and strand into a mutable array. This walks
    /// the whole genome, so it is as slow as reading every alignment.
    pub fn to_genome_array<B: StrandBuffer>(
        &mut self,
    ) -> Result<StrandedArray<B>, GenomeArrayError> {
        let mut array = StrandedArray::with_lengths(
            &self.lengths,
            ArrayConfig::with_strands(&Strand::ALL),
        )?;
        for strand in Strand::ALL {
            for window in self.windows(strand, DEFAULT_WINDOW_SIZE)? {
                let counts = self.get_with_order(&window, false)?;
                if counts.iter().any(|v| *v != 0.0) {
                    array.set_with_order(&window, Values::Vector(counts), false)?;
                }
            }
        }
        Ok(array)
    }

    /// Write the counts on `strand` as a variableStep wiggle track, querying
    /// `window_size` positions at a time.
    pub fn to_variable_step<W: Write>(
        &mut self,
        writer: &mut W,
        trackname: &str,
        strand: Strand,
        window_size: usize,
        params: &IndexMap<String, String>,
    ) -> Result<(), GenomeArrayError> {
        let windows = self.windows(strand, window_size)?;
        write_track_line(writer, "wiggle_0", trackname, params)?;
        let mut output = VariableStepWriter::new(writer);
        for window in windows {
            if window.start == 0 {
                info!("Writing chromosome {}...", window.chrom);
                output.start_chrom(&window.chrom)?;
            }
            let counts = self.get_with_order(&window, false)?;
            for (offset, value) in counts.iter().enumerate() {
                if *value != 0.0 {
                    output.write_value(window.start as u64 + offset as u64, *value)?;
                }
            }
        }
        Ok(())
    }

    /// Write the counts on `strand` as a bedGraph track, querying
    /// `window_size` positions at a time. Runs of equal value are merged
    /// across window boundaries.
    pub fn to_bedgraph<W: Write>(
        &mut self,
        writer: &mut W,
        trackname: &str,
        strand: Strand,
        window_size: usize,
        params: &IndexMap<String, String>,
    ) -> Result<(), GenomeArrayError> {
        let windows = self.windows(strand, window_size)?;
        write_track_line(writer, "bedGraph", trackname, params)?;
        let mut output = BedGraphWriter::new(writer);
        for window in windows {
            if window.start == 0 {
                info!("Writing chromosome {}...", window.chrom);
            }
            let counts = self.get_with_order(&window, false)?;
            for (offset, value) in counts.iter().enumerate() {
                if *value != 0.0 {
                    output.push(&window.chrom, window.start as u64 + offset as u64, *value)?;
                }
            }
        }
        output.finish()?;
        Ok(())
    }
}

impl<S: AlignmentSource> GenomeArray for BamGenomeArray<S> {
    fn get_with_order(
        &mut self,
        segment: &GenomicSegment,
        roi_order: bool,
    ) -> Result<Array1<f64>, GenomeArrayError> {
        Ok(self.get_reads_and_counts(segment, roi_order)?.1)
    }

    fn sum(&mut self) -> Result<f64, GenomeArrayError> {
        Ok(self.sum)
    }

    /// Reset the sum to the total number of mapped reads in all sources.
    fn reset_sum(&mut self) {
        self.sum = self.sources.iter().map(|s| s.mapped() as f64).sum();
    }

    fn set_sum(&mut self, value: f64) {
        self.sum = value;
    }

    fn set_normalize(&mut self, value: bool) {
        self.normalize = value;
    }

    fn is_normalized(&self) -> bool {
        self.normalize
    }

    fn chroms(&self) -> Vec<String> {
        self.lengths.keys().cloned().collect()
    }

    fn strands(&self) -> Vec<Strand> {
        Strand::ALL.to_vec()
    }

    fn lengths(&self) -> IndexMap<String, Position> {
        self.lengths.clone()
    }
}
