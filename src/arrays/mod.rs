//! Mutable genome arrays, generic over the per-strand storage.
//!
//! [`StrandedArray<B>`] holds one [`StrandBuffer`] per chromosome and strand
//! and implements the shared logic of the dense and sparse arrays: growth on
//! out-of-bounds access, strand ordering, normalization, and elementwise
//! combination. The concrete arrays are type aliases:
//!
//!  - [`DenseGenomeArray`](dense::DenseGenomeArray): `StrandedArray<DenseBuffer>`
//!  - [`SparseGenomeArray`](sparse::SparseGenomeArray): `StrandedArray<SparseBuffer>`
//!
//! The immutable, file-backed arrays live in [`bam`] and [`bigwig`].

use std::cmp::{max, min};
use std::io::Write;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

use genomap::GenomeMap;
use indexmap::{IndexMap, IndexSet};
use log::warn;
use ndarray::{s, Array1};

use crate::{
    error::GenomeArrayError,
    io::tracks::{write_track_line, BedGraphWriter, VariableStepWriter},
    ranges::{format_strands, GenomicSegment, Strand},
    traits::{GenomeArray, MutableGenomeArray, StrandBuffer},
    Position, GROWTH_MARGIN, MIN_CHR_SIZE,
};

pub mod bam;
pub mod bigwig;
pub mod dense;
pub mod sparse;

/// Absolute tolerance used when comparing arrays for equality.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// Construction-time settings of a mutable array.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrayConfig {
    /// The strands the array stores. Writes to any other strand fail.
    pub strands: Vec<Strand>,
    /// Size allocated for a chromosome the first time it is touched.
    pub min_chr_size: usize,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            strands: Strand::DEFAULT.to_vec(),
            min_chr_size: MIN_CHR_SIZE,
        }
    }
}

impl ArrayConfig {
    pub fn with_strands(strands: &[Strand]) -> Self {
        Self {
            strands: strands.to_vec(),
            ..Self::default()
        }
    }

    pub fn min_chr_size(mut self, min_chr_size: usize) -> Self {
        self.min_chr_size = min_chr_size;
        self
    }
}

/// Values to write over a segment: one scalar for every position, or one
/// value per position.
#[derive(Clone, Debug, PartialEq)]
pub enum Values {
    Scalar(f64),
    Vector(Array1<f64>),
}

impl From<f64> for Values {
    fn from(value: f64) -> Self {
        Values::Scalar(value)
    }
}

impl From<Array1<f64>> for Values {
    fn from(values: Array1<f64>) -> Self {
        Values::Vector(values)
    }
}

impl From<Vec<f64>> for Values {
    fn from(values: Vec<f64>) -> Self {
        Values::Vector(Array1::from(values))
    }
}

/// The right-hand side of [`StrandedArray::apply_operation`].
#[derive(Clone, Debug)]
pub enum Operand<'a, B: StrandBuffer> {
    Scalar(f64),
    Array(&'a StrandedArray<B>),
}

/// How two arrays with different chromosomes, strands, or lengths are lined
/// up before an elementwise operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CombineMode {
    /// Both arrays must have the same chromosomes, strands, and lengths.
    #[default]
    Same,
    /// Union of chromosomes and strands; missing data is zero and shorter
    /// buffers are zero-padded.
    All,
    /// Intersection of chromosomes and strands; longer buffers are cut.
    Truncate,
}

impl FromStr for CombineMode {
    type Err = GenomeArrayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same" => Ok(CombineMode::Same),
            "all" => Ok(CombineMode::All),
            "truncate" => Ok(CombineMode::Truncate),
            _ => Err(GenomeArrayError::InvalidCombineMode(s.to_string())),
        }
    }
}

/// A mutable genome array storing each chromosome and strand in a `B`.
#[derive(Clone, Debug)]
pub struct StrandedArray<B: StrandBuffer> {
    chroms: GenomeMap<IndexMap<Strand, B>>,
    strands: Vec<Strand>,
    min_chr_size: usize,
    sum: Option<f64>,
    normalize: bool,
}

impl<B: StrandBuffer> Default for StrandedArray<B> {
    fn default() -> Self {
        Self::new(ArrayConfig::default())
    }
}

impl<B: StrandBuffer> StrandedArray<B> {
    /// Create an empty array. Chromosomes are allocated on first access.
    pub fn new(config: ArrayConfig) -> Self {
        Self {
            chroms: GenomeMap::new(),
            strands: config.strands,
            min_chr_size: config.min_chr_size,
            sum: None,
            normalize: false,
        }
    }

    /// Create an array with every chromosome in `seqlens` allocated up front.
    pub fn with_lengths(
        seqlens: &IndexMap<String, Position>,
        config: ArrayConfig,
    ) -> Result<Self, GenomeArrayError> {
        let mut array = Self::new(config);
        for (chrom, length) in seqlens {
            let buffers = array.new_chrom(*length as usize);
            array.chroms.insert(chrom, buffers)?;
        }
        Ok(array)
    }

    /// An empty array with the chromosome lengths and strands of `other`.
    pub fn like<A: GenomeArray + ?Sized>(other: &A) -> Result<Self, GenomeArrayError> {
        Self::with_lengths(
            &other.lengths(),
            ArrayConfig::with_strands(&other.strands()),
        )
    }

    pub fn min_chr_size(&self) -> usize {
        self.min_chr_size
    }

    fn new_chrom(&self, length: usize) -> IndexMap<Strand, B> {
        self.strands
            .iter()
            .map(|strand| (*strand, B::zeros(length)))
            .collect()
    }

    fn check_strand(&self, strand: Strand) -> Result<(), GenomeArrayError> {
        if self.strands.contains(&strand) {
            Ok(())
        } else {
            Err(GenomeArrayError::StrandNotInArray(
                strand.to_string(),
                format_strands(&self.strands),
            ))
        }
    }

    /// The buffer addressed by `segment`, allocating the chromosome or
    /// growing every strand of it so that `segment.end` is in bounds.
    fn buffer_mut(&mut self, segment: &GenomicSegment) -> Result<&mut B, GenomeArrayError> {
        self.check_strand(segment.strand)?;
        if self.chroms.get(&segment.chrom).is_none() {
            let buffers = self.new_chrom(self.min_chr_size);
            self.chroms.insert(&segment.chrom, buffers)?;
        }
        let buffers = self
            .chroms
            .get_mut(&segment.chrom)
            .ok_or_else(|| GenomeArrayError::MissingSequence(segment.chrom.clone()))?;

        let end = segment.end as usize;
        let current = buffers.get(&segment.strand).map_or(0, |b| b.len());
        if end > current {
            let new_len = max(current + GROWTH_MARGIN, end + GROWTH_MARGIN);
            for buffer in buffers.values_mut() {
                if buffer.len() < new_len {
                    buffer.resize(new_len);
                }
            }
        }
        buffers
            .get_mut(&segment.strand)
            .ok_or_else(|| GenomeArrayError::MissingSequence(segment.chrom.clone()))
    }

    /// The buffer of `chrom` and `strand`, if allocated.
    pub fn buffer(&self, chrom: &str, strand: Strand) -> Option<&B> {
        self.chroms.get(chrom).and_then(|buffers| buffers.get(&strand))
    }

    /// Nonzero `(index, value)` pairs of one chromosome and strand, sorted by
    /// index. Empty if the chromosome or strand is not allocated.
    pub fn nonzero_values(&self, chrom: &str, strand: Strand) -> Vec<(usize, f64)> {
        self.buffer(chrom, strand)
            .map(|buffer| buffer.nonzero())
            .unwrap_or_default()
    }

    /// Copy into an array with a different storage backend.
    pub fn convert<C: StrandBuffer>(&self) -> Result<StrandedArray<C>, GenomeArrayError> {
        let mut chroms = GenomeMap::new();
        for (chrom, buffers) in self.chroms.iter() {
            let converted: IndexMap<Strand, C> = buffers
                .iter()
                .map(|(strand, buffer)| (*strand, C::from_nonzero(buffer.len(), &buffer.nonzero())))
                .collect();
            chroms.insert(chrom, converted)?;
        }
        Ok(StrandedArray {
            chroms,
            strands: self.strands.clone(),
            min_chr_size: self.min_chr_size,
            sum: self.sum,
            normalize: self.normalize,
        })
    }

    /// Whether `other` holds the same nonzero positions with values within
    /// `tolerance`. Buffer lengths are ignored.
    pub fn approx_eq<C: StrandBuffer>(&self, other: &StrandedArray<C>, tolerance: f64) -> bool {
        let chroms: IndexSet<String> = self
            .chroms
            .names()
            .into_iter()
            .chain(other.chroms.names())
            .collect();
        let strands: IndexSet<Strand> = self
            .strands
            .iter()
            .chain(other.strands.iter())
            .copied()
            .collect();
        for chrom in &chroms {
            for strand in &strands {
                let left = self.nonzero_values(chrom, *strand);
                let right = other.nonzero_values(chrom, *strand);
                if left.len() != right.len() {
                    return false;
                }
                let same = left
                    .iter()
                    .zip(right.iter())
                    .all(|((i, a), (j, b))| i == j && (a - b).abs() <= tolerance);
                if !same {
                    return false;
                }
            }
        }
        true
    }

    /// Apply `func` elementwise to this array and `other`, returning a new
    /// array. Neither operand is modified, and the result is not normalized.
    pub fn apply_operation<F>(
        &self,
        other: Operand<'_, B>,
        func: F,
        mode: CombineMode,
    ) -> Result<Self, GenomeArrayError>
    where
        F: Fn(f64, f64) -> f64,
    {
        match other {
            Operand::Scalar(value) => Ok(self.map_buffers(|buffer| buffer.map(|x| func(x, value)))),
            Operand::Array(other) => {
                self.combine(other, mode, |left, right| left.zip_with(right, &func))
            }
        }
    }

    /// Elementwise product with `other`, using the buffer's own product so
    /// sparse buffers only visit shared nonzero positions.
    pub fn multiply(&self, other: &Self, mode: CombineMode) -> Result<Self, GenomeArrayError> {
        self.combine(other, mode, |left, right| left.multiply(right))
    }

    fn derived(&self, chroms: GenomeMap<IndexMap<Strand, B>>, strands: Vec<Strand>) -> Self {
        if self.normalize {
            warn!("Normalization is ignored while combining arrays. The result is not normalized.");
        }
        Self {
            chroms,
            strands,
            min_chr_size: self.min_chr_size,
            sum: None,
            normalize: false,
        }
    }

    fn map_buffers<F: Fn(&B) -> B>(&self, func: F) -> Self {
        let mut chroms = GenomeMap::new();
        for (chrom, buffers) in self.chroms.iter() {
            let mapped: IndexMap<Strand, B> = buffers
                .iter()
                .map(|(strand, buffer)| (*strand, func(buffer)))
                .collect();
            // this cannot fail: names are unique in the source map
            chroms
                .insert(chrom, mapped)
                .expect("Internal error: please report");
        }
        self.derived(chroms, self.strands.clone())
    }

    fn check_same_dimensions(&self, other: &Self) -> Result<(), GenomeArrayError> {
        let own: IndexSet<String> = self.chroms.names().into_iter().collect();
        let theirs: IndexSet<String> = other.chroms.names().into_iter().collect();
        if own != theirs {
            return Err(GenomeArrayError::DimensionMismatch(format!(
                "chromosomes differ ({:?} vs {:?})",
                own, theirs
            )));
        }
        let own_strands: IndexSet<Strand> = self.strands.iter().copied().collect();
        let their_strands: IndexSet<Strand> = other.strands.iter().copied().collect();
        if own_strands != their_strands {
            return Err(GenomeArrayError::DimensionMismatch(format!(
                "strands differ ({} vs {})",
                format_strands(&self.strands),
                format_strands(&other.strands)
            )));
        }
        let (own_lengths, their_lengths) = (self.lengths(), other.lengths());
        for (chrom, length) in &own_lengths {
            if their_lengths.get(chrom) != Some(length) {
                return Err(GenomeArrayError::DimensionMismatch(format!(
                    "lengths of '{}' differ",
                    chrom
                )));
            }
        }
        Ok(())
    }

    /// Line up the buffers of both arrays according to `mode` and combine
    /// each pair with `func`. Missing buffers are zeros.
    fn combine<F>(&self, other: &Self, mode: CombineMode, func: F) -> Result<Self, GenomeArrayError>
    where
        F: Fn(&B, &B) -> B,
    {
        if mode == CombineMode::Same {
            self.check_same_dimensions(other)?;
        }
        Ok(self.combine_unchecked(other, mode, func))
    }

    fn combine_unchecked<F>(&self, other: &Self, mode: CombineMode, func: F) -> Self
    where
        F: Fn(&B, &B) -> B,
    {
        let own_chroms: IndexSet<String> = self.chroms.names().into_iter().collect();
        let their_chroms: IndexSet<String> = other.chroms.names().into_iter().collect();
        let own_strands: IndexSet<Strand> = self.strands.iter().copied().collect();
        let their_strands: IndexSet<Strand> = other.strands.iter().copied().collect();
        let (chroms, strands): (IndexSet<String>, IndexSet<Strand>) = match mode {
            CombineMode::Truncate => (
                own_chroms.intersection(&their_chroms).cloned().collect(),
                own_strands.intersection(&their_strands).copied().collect(),
            ),
            CombineMode::Same | CombineMode::All => (
                own_chroms.union(&their_chroms).cloned().collect(),
                own_strands.union(&their_strands).copied().collect(),
            ),
        };

        let (own_lengths, their_lengths) = (self.lengths(), other.lengths());
        let mut combined = GenomeMap::new();
        for chrom in &chroms {
            let own_len = own_lengths.get(chrom).map(|l| *l as usize);
            let their_len = their_lengths.get(chrom).map(|l| *l as usize);
            let length = match (mode, own_len, their_len) {
                (CombineMode::Truncate, Some(a), Some(b)) => min(a, b),
                (_, a, b) => max(a.unwrap_or(0), b.unwrap_or(0)),
            };
            let mut buffers = IndexMap::new();
            for strand in &strands {
                let left = fitted(self.buffer(chrom, *strand), length);
                let right = fitted(other.buffer(chrom, *strand), length);
                buffers.insert(*strand, func(&left, &right));
            }
            // this cannot fail: names come from a set
            combined
                .insert(chrom, buffers)
                .expect("Internal error: please report");
        }
        self.derived(combined, strands.into_iter().collect())
    }

    /// Write the values of `strand` as a variableStep wiggle track. Values
    /// are normalized if normalization is on.
    pub fn to_variable_step<W: Write>(
        &mut self,
        writer: &mut W,
        trackname: &str,
        strand: Strand,
        params: &IndexMap<String, String>,
    ) -> Result<(), GenomeArrayError> {
        self.check_strand(strand)?;
        let scale = self.export_scale()?;
        write_track_line(writer, "wiggle_0", trackname, params)?;
        let mut output = VariableStepWriter::new(writer);
        for chrom in self.sorted_chroms() {
            output.start_chrom(&chrom)?;
            for (index, value) in self.nonzero_values(&chrom, strand) {
                output.write_value(index as u64, value * scale)?;
            }
        }
        Ok(())
    }

    /// Write the values of `strand` as a bedGraph track, merging adjacent
    /// positions with equal values. Values are normalized if normalization
    /// is on.
    pub fn to_bedgraph<W: Write>(
        &mut self,
        writer: &mut W,
        trackname: &str,
        strand: Strand,
        params: &IndexMap<String, String>,
    ) -> Result<(), GenomeArrayError> {
        self.check_strand(strand)?;
        let scale = self.export_scale()?;
        write_track_line(writer, "bedGraph", trackname, params)?;
        let mut output = BedGraphWriter::new(writer);
        for chrom in self.sorted_chroms() {
            for (index, value) in self.nonzero_values(&chrom, strand) {
                output.push(&chrom, index as u64, value * scale)?;
            }
        }
        output.finish()?;
        Ok(())
    }

    fn sorted_chroms(&self) -> Vec<String> {
        let mut chroms = self.chroms.names();
        chroms.sort();
        chroms
    }

    fn export_scale(&mut self) -> Result<f64, GenomeArrayError> {
        if self.normalize {
            Ok(1e6 / self.sum()?)
        } else {
            Ok(1.0)
        }
    }
}

/// A copy of `buffer` resized to `length`, or zeros if absent.
fn fitted<B: StrandBuffer>(buffer: Option<&B>, length: usize) -> B {
    match buffer {
        Some(buffer) => {
            let mut buffer = buffer.clone();
            if buffer.len() != length {
                buffer.resize(length);
            }
            buffer
        }
        None => B::zeros(length),
    }
}

impl<B: StrandBuffer> GenomeArray for StrandedArray<B> {
    fn get_with_order(
        &mut self,
        segment: &GenomicSegment,
        roi_order: bool,
    ) -> Result<Array1<f64>, GenomeArrayError> {
        let mut values = self
            .buffer_mut(segment)?
            .values(segment.start as usize, segment.end as usize);
        if self.normalize {
            let total = self.sum()?;
            values.mapv_inplace(|v| 1e6 * v / total);
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
        let total = self
            .chroms
            .values()
            .flat_map(|buffers| buffers.values())
            .map(|buffer| buffer.total())
            .sum();
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
        self.chroms.names()
    }

    fn strands(&self) -> Vec<Strand> {
        self.strands.clone()
    }

    fn lengths(&self) -> IndexMap<String, Position> {
        self.chroms
            .iter()
            .map(|(chrom, buffers)| {
                let length = buffers.values().map(|b| b.len()).max().unwrap_or(0);
                (chrom.to_string(), length as Position)
            })
            .collect()
    }

    fn contains(&self, chrom: &str) -> bool {
        self.chroms.get(chrom).is_some()
    }
}

impl<B: StrandBuffer> MutableGenomeArray for StrandedArray<B> {
    fn set_with_order(
        &mut self,
        segment: &GenomicSegment,
        values: Values,
        roi_order: bool,
    ) -> Result<(), GenomeArrayError> {
        let values = match values {
            Values::Scalar(value) => Array1::from_elem(segment.len(), value),
            Values::Vector(vector) if vector.len() != segment.len() => {
                return Err(GenomeArrayError::ValueLengthMismatch(
                    vector.len(),
                    segment.len(),
                ))
            }
            Values::Vector(vector) if roi_order && segment.strand.is_reverse() => {
                vector.slice(s![..;-1]).to_owned()
            }
            Values::Vector(vector) => vector,
        };
        self.sum = None;
        self.buffer_mut(segment)?
            .assign(segment.start as usize, values.view());
        Ok(())
    }

    fn add_with_order(
        &mut self,
        segment: &GenomicSegment,
        values: Values,
        roi_order: bool,
    ) -> Result<(), GenomeArrayError> {
        let values = match values {
            Values::Scalar(value) => Array1::from_elem(segment.len(), value),
            Values::Vector(vector) if vector.len() != segment.len() => {
                return Err(GenomeArrayError::ValueLengthMismatch(
                    vector.len(),
                    segment.len(),
                ))
            }
            Values::Vector(vector) if roi_order && segment.strand.is_reverse() => {
                vector.slice(s![..;-1]).to_owned()
            }
            Values::Vector(vector) => vector,
        };
        self.sum = None;
        self.buffer_mut(segment)?
            .increment(segment.start as usize, values.view());
        Ok(())
    }

    fn nonzero(&self) -> IndexMap<String, IndexMap<Strand, Vec<usize>>> {
        self.chroms
            .iter()
            .map(|(chrom, buffers)| {
                let by_strand: IndexMap<Strand, Vec<usize>> = buffers
                    .iter()
                    .map(|(strand, buffer)| {
                        let indices = buffer.nonzero().into_iter().map(|(i, _)| i);
                        (*strand, indices.collect::<Vec<_>>())
                    })
                    .collect();
                (chrom.to_string(), by_strand)
            })
            .collect()
    }
}

impl<B: StrandBuffer, C: StrandBuffer> PartialEq<StrandedArray<C>> for StrandedArray<B> {
    fn eq(&self, other: &StrandedArray<C>) -> bool {
        self.approx_eq(other, DEFAULT_TOLERANCE)
    }
}

impl<'a, B: StrandBuffer> Add<&'a StrandedArray<B>> for &'a StrandedArray<B> {
    type Output = StrandedArray<B>;

    fn add(self, other: &'a StrandedArray<B>) -> StrandedArray<B> {
        self.combine_unchecked(other, CombineMode::All, |l, r| l.zip_with(r, |a, b| a + b))
    }
}

impl<'a, B: StrandBuffer> Sub<&'a StrandedArray<B>> for &'a StrandedArray<B> {
    type Output = StrandedArray<B>;

    fn sub(self, other: &'a StrandedArray<B>) -> StrandedArray<B> {
        self.combine_unchecked(other, CombineMode::All, |l, r| l.zip_with(r, |a, b| a - b))
    }
}

impl<'a, B: StrandBuffer> Mul<&'a StrandedArray<B>> for &'a StrandedArray<B> {
    type Output = StrandedArray<B>;

    fn mul(self, other: &'a StrandedArray<B>) -> StrandedArray<B> {
        self.combine_unchecked(other, CombineMode::All, |l, r| l.multiply(r))
    }
}

impl<B: StrandBuffer> Add<f64> for &StrandedArray<B> {
    type Output = StrandedArray<B>;

    fn add(self, value: f64) -> StrandedArray<B> {
        self.map_buffers(|buffer| buffer.map(|x| x + value))
    }
}

impl<B: StrandBuffer> Sub<f64> for &StrandedArray<B> {
    type Output = StrandedArray<B>;

    fn sub(self, value: f64) -> StrandedArray<B> {
        self.map_buffers(|buffer| buffer.map(|x| x - value))
    }
}

impl<B: StrandBuffer> Mul<f64> for &StrandedArray<B> {
    type Output = StrandedArray<B>;

    fn mul(self, value: f64) -> StrandedArray<B> {
        self.map_buffers(|buffer| buffer.map(|x| x * value))
    }
}
