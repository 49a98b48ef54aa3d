//! Traits used by the genomearray library.
//!

use indexmap::IndexMap;
use ndarray::{s, Array1, ArrayView1};

use crate::{
    arrays::Values,
    error::GenomeArrayError,
    io::{bowtie::BowtieAlignment, wiggle::WiggleRecord},
    mapping::{MapParams, MapRule},
    ranges::{format_strands, AlignedRead, GenomicSegment, SegmentChain, Strand},
    Position,
};

/// The [`GenomeArray`] trait is the positional array contract shared by every
/// backend: given a [`GenomicSegment`], return one value per nucleotide.
///
/// Methods take `&mut self` because a read may grow a buffer, refresh the
/// cached sum, or pull records from a file handle.
pub trait GenomeArray {
    /// Retrieve values over `segment`. If `roi_order` is true, index 0 is the
    /// 5' end of the segment (so minus-strand values are reversed); otherwise
    /// values are in increasing genomic order.
    fn get_with_order(
        &mut self,
        segment: &GenomicSegment,
        roi_order: bool,
    ) -> Result<Array1<f64>, GenomeArrayError>;

    /// Retrieve values over `segment`, 5' to 3'.
    fn get(&mut self, segment: &GenomicSegment) -> Result<Array1<f64>, GenomeArrayError> {
        self.get_with_order(segment, true)
    }

    /// Retrieve values over the spliced positions of `chain`, 5' to 3'.
    fn get_chain(&mut self, chain: &SegmentChain) -> Result<Array1<f64>, GenomeArrayError> {
        let mut values = Vec::with_capacity(chain.len());
        for segment in chain.segments() {
            values.extend(self.get_with_order(segment, false)?);
        }
        let values = Array1::from(values);
        if chain.strand().is_reverse() {
            return Ok(values.slice(s![..;-1]).to_owned());
        }
        Ok(values)
    }

    /// The raw total of the array. Never affected by normalization.
    fn sum(&mut self) -> Result<f64, GenomeArrayError>;

    /// Forget any cached or overridden sum, so the next [`GenomeArray::sum`]
    /// recomputes it from the data.
    fn reset_sum(&mut self);

    /// Override the sum used for normalization, e.g. to normalize to a
    /// total obtained elsewhere.
    fn set_sum(&mut self, value: f64);

    /// Toggle whether fetched values are reported as reads per million
    /// (`1e6 * value / sum`).
    fn set_normalize(&mut self, value: bool);

    fn is_normalized(&self) -> bool;

    /// Chromosome names, in the order they were first seen.
    fn chroms(&self) -> Vec<String>;

    fn strands(&self) -> Vec<Strand>;

    /// The length of every chromosome, taking the maximum over strands.
    fn lengths(&self) -> IndexMap<String, Position>;

    fn contains(&self, chrom: &str) -> bool {
        self.lengths().contains_key(chrom)
    }

    /// The number of addressable positions: strands times the total length.
    fn len(&self) -> usize {
        let total: usize = self.lengths().values().map(|&l| l as usize).sum();
        self.strands().len() * total
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The [`MutableGenomeArray`] trait adds in-place assignment to a
/// [`GenomeArray`]. Every mutation invalidates the cached sum.
pub trait MutableGenomeArray: GenomeArray {
    /// Assign `values` over `segment`. A vector is read 5' to 3' when
    /// `roi_order` is true and in genomic order otherwise.
    fn set_with_order(
        &mut self,
        segment: &GenomicSegment,
        values: Values,
        roi_order: bool,
    ) -> Result<(), GenomeArrayError>;

    /// Accumulate `values` into `segment` (`+=`). Vectors are ordered as in
    /// [`MutableGenomeArray::set_with_order`].
    fn add_with_order(
        &mut self,
        segment: &GenomicSegment,
        values: Values,
        roi_order: bool,
    ) -> Result<(), GenomeArrayError>;

    /// Sorted indices of every nonzero position, per chromosome and strand.
    fn nonzero(&self) -> IndexMap<String, IndexMap<Strand, Vec<usize>>>;

    fn set(&mut self, segment: &GenomicSegment, values: Values) -> Result<(), GenomeArrayError> {
        self.set_with_order(segment, values, true)
    }

    /// Accumulate `values` into `segment`, a vector given 5' to 3'.
    fn add(&mut self, segment: &GenomicSegment, values: Values) -> Result<(), GenomeArrayError> {
        self.add_with_order(segment, values, true)
    }

    /// Assign `values` over the spliced positions of `chain`. A vector is
    /// given 5' to 3' and split across the segments by their lengths.
    fn set_chain(&mut self, chain: &SegmentChain, values: Values) -> Result<(), GenomeArrayError> {
        let mut vector = match values {
            Values::Scalar(value) => {
                for segment in chain.segments() {
                    self.set_with_order(segment, Values::Scalar(value), false)?;
                }
                return Ok(());
            }
            Values::Vector(vector) => vector,
        };
        if vector.len() != chain.len() {
            return Err(GenomeArrayError::ValueLengthMismatch(
                vector.len(),
                chain.len(),
            ));
        }
        if chain.strand().is_reverse() {
            vector = vector.slice(s![..;-1]).to_owned();
        }
        let mut offset = 0;
        for segment in chain.segments() {
            let part = vector.slice(s![offset..offset + segment.len()]).to_owned();
            self.set_with_order(segment, Values::Vector(part), false)?;
            offset += segment.len();
        }
        Ok(())
    }

    /// Map every alignment with aligned length in `[min_length, max_length]`
    /// through `rule` and accumulate the contributions. `None` leaves the
    /// upper bound open. Returns the number of alignments counted.
    fn add_from_bowtie<I>(
        &mut self,
        records: I,
        rule: MapRule,
        params: &MapParams,
        min_length: usize,
        max_length: Option<usize>,
    ) -> Result<usize, GenomeArrayError>
    where
        I: IntoIterator<Item = Result<BowtieAlignment, GenomeArrayError>>,
        Self: Sized,
    {
        let mut counted = 0;
        for record in records {
            let alignment = record?.segment();
            let length = alignment.len();
            if length < min_length || max_length.is_some_and(|max| length > max) {
                continue;
            }
            for (segment, value) in rule(&alignment, params) {
                self.add(&segment, Values::Scalar(value))?;
            }
            counted += 1;
        }
        self.reset_sum();
        Ok(counted)
    }

    /// Accumulate every wiggle or bedGraph interval onto `strand`. Returns
    /// the number of intervals read.
    fn add_from_wiggle<I>(&mut self, records: I, strand: Strand) -> Result<usize, GenomeArrayError>
    where
        I: IntoIterator<Item = Result<WiggleRecord, GenomeArrayError>>,
        Self: Sized,
    {
        let strands = self.strands();
        if !strands.contains(&strand) {
            return Err(GenomeArrayError::StrandNotInArray(
                strand.to_string(),
                format_strands(&strands),
            ));
        }
        let mut counted = 0;
        for record in records {
            let record = record?;
            let segment = GenomicSegment::new(record.chrom, record.start, record.end, strand)?;
            self.add(&segment, Values::Scalar(record.value))?;
            counted += 1;
        }
        self.reset_sum();
        Ok(counted)
    }
}

/// Storage for the values of one strand of one chromosome.
///
/// Buffers are addressed with 0-based half-open `[start, end)` ranges that
/// the caller has already grown the buffer to cover.
pub trait StrandBuffer: Clone + std::fmt::Debug {
    fn zeros(len: usize) -> Self;

    /// Build a buffer of `len` from sorted nonzero `(index, value)` pairs.
    fn from_nonzero(len: usize, entries: &[(usize, f64)]) -> Self;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grow or shrink to `len`, padding with zeros.
    fn resize(&mut self, len: usize);

    /// Copy out the values over `[start, end)`.
    fn values(&self, start: usize, end: usize) -> Array1<f64>;

    /// Overwrite the values starting at `start`.
    fn assign(&mut self, start: usize, values: ArrayView1<'_, f64>);

    /// Add `values` elementwise starting at `start`.
    fn increment(&mut self, start: usize, values: ArrayView1<'_, f64>);

    fn total(&self) -> f64;

    /// Nonzero `(index, value)` pairs, sorted by index.
    fn nonzero(&self) -> Vec<(usize, f64)>;

    /// Apply `func` to every position, including zeros.
    fn map<F: Fn(f64) -> f64>(&self, func: F) -> Self;

    /// Combine with an equally long buffer, position by position.
    fn zip_with<F: Fn(f64, f64) -> f64>(&self, other: &Self, func: F) -> Self;

    /// Elementwise product with an equally long buffer.
    fn multiply(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a * b)
    }
}

/// A source of read alignments that can be queried by region, such as an
/// indexed BAM file.
pub trait AlignmentSource {
    /// Reference sequence names and lengths, in header order.
    fn references(&self) -> Vec<(String, Position)>;

    /// The number of mapped records, as reported by the index.
    fn mapped(&self) -> u64;

    /// Every alignment overlapping `[start, end)` on `chrom`.
    fn fetch(
        &mut self,
        chrom: &str,
        start: Position,
        end: Position,
    ) -> Result<Vec<AlignedRead>, GenomeArrayError>;
}

/// A source of continuous per-base signal, such as a BigWig file.
pub trait SignalSource {
    fn chrom_lengths(&self) -> IndexMap<String, Position>;

    /// The total signal over the whole file.
    fn total(&mut self) -> Result<f64, GenomeArrayError>;

    /// Per-base values over `[start, end)` on `chrom`, one per position.
    /// Positions without data are reported as the source's fill value.
    fn values(
        &mut self,
        chrom: &str,
        start: Position,
        end: Position,
    ) -> Result<Array1<f64>, GenomeArrayError>;
}
