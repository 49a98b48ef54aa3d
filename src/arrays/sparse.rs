//! Sparse storage: one [`CsVec<f64>`] per chromosome and strand.

use ndarray::{Array1, ArrayView1};
use sprs::CsVec;

use crate::{arrays::StrandedArray, traits::StrandBuffer};

/// A mutable genome array storing only nonzero positions.
///
/// Much smaller than a [`DenseGenomeArray`](crate::arrays::dense::DenseGenomeArray)
/// for sparse data such as mapped read ends, but every write rebuilds the
/// index and value vectors of the touched buffer, so repeated small writes
/// are slower than in the dense array.
pub type SparseGenomeArray = StrandedArray<SparseBuffer>;

#[derive(Clone, Debug, PartialEq)]
pub struct SparseBuffer {
    values: CsVec<f64>,
}

impl SparseBuffer {
    /// Build from `(index, value)` pairs already sorted by index, dropping zeros.
    fn from_sorted<I>(len: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let (indices, data): (Vec<usize>, Vec<f64>) =
            entries.into_iter().filter(|(_, v)| *v != 0.0).unzip();
        Self {
            values: CsVec::new(len, indices, data),
        }
    }

    /// Position of the first stored entry at or after `index`.
    fn lower_bound(&self, index: usize) -> usize {
        self.values.indices().partition_point(|&i| i < index)
    }

    fn entries(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values.iter().map(|(i, v)| (i, *v))
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.nnz()
    }
}

impl StrandBuffer for SparseBuffer {
    fn zeros(len: usize) -> Self {
        Self {
            values: CsVec::empty(len),
        }
    }

    fn from_nonzero(len: usize, entries: &[(usize, f64)]) -> Self {
        Self::from_sorted(len, entries.iter().copied())
    }

    fn len(&self) -> usize {
        self.values.dim()
    }

    fn resize(&mut self, len: usize) {
        let kept: Vec<(usize, f64)> = self.entries().filter(|(i, _)| *i < len).collect();
        *self = Self::from_sorted(len, kept);
    }

    fn values(&self, start: usize, end: usize) -> Array1<f64> {
        let mut values = Array1::zeros(end - start);
        let (lo, hi) = (self.lower_bound(start), self.lower_bound(end));
        let indices = &self.values.indices()[lo..hi];
        let data = &self.values.data()[lo..hi];
        for (index, value) in indices.iter().zip(data) {
            values[index - start] = *value;
        }
        values
    }

    fn assign(&mut self, start: usize, values: ArrayView1<'_, f64>) {
        let end = start + values.len();
        let (lo, hi) = (self.lower_bound(start), self.lower_bound(end));
        let before = self.entries().take(lo);
        let within = values
            .iter()
            .enumerate()
            .map(|(offset, value)| (start + offset, *value));
        let after = self.entries().skip(hi);
        let entries: Vec<(usize, f64)> = before.chain(within).chain(after).collect();
        *self = Self::from_sorted(self.len(), entries);
    }

    fn increment(&mut self, start: usize, values: ArrayView1<'_, f64>) {
        let mut current = self.values(start, start + values.len());
        current += &values;
        self.assign(start, current.view());
    }

    fn total(&self) -> f64 {
        self.values.data().iter().sum()
    }

    fn nonzero(&self) -> Vec<(usize, f64)> {
        self.entries().filter(|(_, v)| *v != 0.0).collect()
    }

    fn map<F: Fn(f64) -> f64>(&self, func: F) -> Self {
        if func(0.0) == 0.0 {
            return Self::from_sorted(self.len(), self.entries().map(|(i, v)| (i, func(v))));
        }
        // every position becomes nonzero
        let dense = self.values(0, self.len()).mapv(func);
        Self::from_sorted(self.len(), dense.into_iter().enumerate())
    }

    fn zip_with<F: Fn(f64, f64) -> f64>(&self, other: &Self, func: F) -> Self {
        crate::ensure_eq!(self.len(), other.len());
        if func(0.0, 0.0) != 0.0 {
            let left = self.values(0, self.len());
            let right = other.values(0, other.len());
            let combined = left
                .iter()
                .zip(right.iter())
                .map(|(a, b)| func(*a, *b))
                .enumerate();
            return Self::from_sorted(self.len(), combined.collect::<Vec<_>>());
        }
        // merge the two sorted index lists
        let (mut left, mut right) = (self.entries().peekable(), other.entries().peekable());
        let mut merged = Vec::with_capacity(self.nnz() + other.nnz());
        loop {
            let next = match (left.peek(), right.peek()) {
                (Some(&(i, a)), Some(&(j, b))) if i == j => {
                    left.next();
                    right.next();
                    (i, func(a, b))
                }
                (Some(&(i, a)), Some(&(j, _))) if i < j => {
                    left.next();
                    (i, func(a, 0.0))
                }
                (_, Some(&(j, b))) => {
                    right.next();
                    (j, func(0.0, b))
                }
                (Some(&(i, a)), None) => {
                    left.next();
                    (i, func(a, 0.0))
                }
                (None, None) => break,
            };
            merged.push(next);
        }
        Self::from_sorted(self.len(), merged)
    }

    /// Only positions stored in both buffers can be nonzero in the product.
    fn multiply(&self, other: &Self) -> Self {
        let (mut left, mut right) = (self.entries().peekable(), other.entries().peekable());
        let mut product = Vec::with_capacity(self.nnz().min(other.nnz()));
        while let (Some(&(i, a)), Some(&(j, b))) = (left.peek(), right.peek()) {
            if i == j {
                product.push((i, a * b));
                left.next();
                right.next();
            } else if i < j {
                left.next();
            } else {
                right.next();
            }
        }
        Self::from_sorted(self.len(), product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;

    fn seg(start: Position, end: Position, strand: Strand) -> GenomicSegment {
        GenomicSegment::new("chrA", start, end, strand).unwrap()
    }

    #[test]
    fn test_sparse_set_get() {
        let mut ga = SparseGenomeArray::with_lengths(&seqlens!("chrA" => 500), ArrayConfig::default())
            .unwrap();
        let region = seg(100, 105, Strand::Minus);
        let vector = Array1::from(vec![1.0, 0.0, 3.0, 0.0, 5.0]);
        ga.set(&region, vector.clone().into()).unwrap();
        assert_eq!(ga.get(&region).unwrap(), vector);
        assert_eq!(ga.buffer("chrA", Strand::Minus).unwrap().nnz(), 3);

        // overwrite part of the region with zeros
        ga.set(&seg(100, 102, Strand::Minus), 0.0.into()).unwrap();
        assert_eq!(ga.sum().unwrap(), 4.0);
        assert_eq!(ga.nonzero()["chrA"][&Strand::Minus], vec![102, 104]);
    }

    #[test]
    fn test_sparse_add_minus_strand_order() {
        let mut ga = SparseGenomeArray::new(ArrayConfig::default().min_chr_size(500));
        let region = seg(100, 105, Strand::Minus);
        let vector = Array1::from(vec![1.0, 2.0, 0.0, 4.0, 5.0]);
        ga.set(&region, vector.clone().into()).unwrap();
        ga.add(&region, vector.clone().into()).unwrap();
        assert_eq!(ga.get(&region).unwrap(), &vector * 2.0);
        assert_eq!(ga.get_with_order(&region, false).unwrap()[0], 10.0);
    }

    #[test]
    fn test_sparse_default_growth() {
        let mut ga = SparseGenomeArray::default();
        ga.set(&seg(9_999_999, 10_000_000, Strand::Plus), 1.0.into())
            .unwrap();
        ga.set(&seg(15_000_000, 15_000_001, Strand::Plus), 2.0.into())
            .unwrap();
        assert_eq!(ga.lengths()["chrA"], 15_010_001);
        assert_eq!(ga.get(&seg(9_999_999, 10_000_000, Strand::Plus)).unwrap()[0], 1.0);
        assert_eq!(ga.sum().unwrap(), 3.0);
    }

    #[test]
    fn test_sparse_matches_dense() {
        let mut dense = DenseGenomeArray::new(ArrayConfig::default().min_chr_size(1000));
        let mut sparse = SparseGenomeArray::new(ArrayConfig::default().min_chr_size(1000));
        let writes = [
            (seg(10, 20, Strand::Plus), 1.0),
            (seg(15, 25, Strand::Plus), 2.0),
            (seg(900, 1100, Strand::Minus), 0.5),
        ];
        for (region, value) in writes.iter() {
            dense.add(region, (*value).into()).unwrap();
            sparse.add(region, (*value).into()).unwrap();
        }
        assert!(dense == sparse);
        assert_eq!(dense.sum().unwrap(), sparse.sum().unwrap());
        assert_eq!(dense.lengths(), sparse.lengths());
    }

    #[test]
    fn test_sparse_multiply_fast_path() {
        let mut a = SparseGenomeArray::new(ArrayConfig::default().min_chr_size(100));
        let mut b = SparseGenomeArray::new(ArrayConfig::default().min_chr_size(100));
        a.set(&seg(0, 10, Strand::Plus), 2.0.into()).unwrap();
        b.set(&seg(5, 15, Strand::Plus), 3.0.into()).unwrap();
        let mut product = a.multiply(&b, CombineMode::Same).unwrap();
        assert_eq!(product.nonzero()["chrA"][&Strand::Plus], vec![5, 6, 7, 8, 9]);
        assert_eq!(product.sum().unwrap(), 30.0);
        let generic = a
            .apply_operation(Operand::Array(&b), |x, y| x * y, CombineMode::Same)
            .unwrap();
        assert!(product == generic);
    }

    #[test]
    fn test_sparse_map_with_nonzero_image_of_zero() {
        let buffer = SparseBuffer::from_nonzero(4, &[(1, 2.0)]);
        let shifted = buffer.map(|x| x + 1.0);
        assert_eq!(shifted.nonzero(), vec![(0, 1.0), (1, 3.0), (2, 1.0), (3, 1.0)]);
        let scaled = buffer.map(|x| x * 2.0);
        assert_eq!(scaled.nnz(), 1);
    }

    #[test]
    fn test_sparse_zip_with_union() {
        let left = SparseBuffer::from_nonzero(6, &[(0, 1.0), (3, 2.0)]);
        let right = SparseBuffer::from_nonzero(6, &[(3, 2.0), (5, 4.0)]);
        let difference = left.zip_with(&right, |a, b| a - b);
        assert_eq!(difference.nonzero(), vec![(0, 1.0), (5, -4.0)]);
    }

    #[test]
    fn test_sparse_resize() {
        let mut buffer = SparseBuffer::from_nonzero(10, &[(2, 1.0), (8, 1.0)]);
        buffer.resize(5);
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.nonzero(), vec![(2, 1.0)]);
        buffer.resize(20);
        assert_eq!(buffer.values(0, 4), Array1::from(vec![0.0, 0.0, 1.0, 0.0]));
    }
}
