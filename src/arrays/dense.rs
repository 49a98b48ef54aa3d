//! Dense storage: one contiguous [`Array1<f64>`] per chromosome and strand.

use ndarray::{s, Array1, ArrayView1, Zip};

use crate::{arrays::StrandedArray, traits::StrandBuffer};

/// A mutable genome array keeping every position in memory.
///
/// Reads and writes are plain slice operations. Memory use is eight bytes
/// per position per strand, so whole genomes are best loaded with known
/// chromosome lengths (see [`StrandedArray::with_lengths`]) to avoid
/// repeated growth.
pub type DenseGenomeArray = StrandedArray<DenseBuffer>;

#[derive(Clone, Debug, PartialEq)]
pub struct DenseBuffer {
    values: Array1<f64>,
}

impl DenseBuffer {
    pub fn as_array(&self) -> &Array1<f64> {
        &self.values
    }
}

impl From<Array1<f64>> for DenseBuffer {
    fn from(values: Array1<f64>) -> Self {
        Self { values }
    }
}

impl StrandBuffer for DenseBuffer {
    fn zeros(len: usize) -> Self {
        Self {
            values: Array1::zeros(len),
        }
    }

    fn from_nonzero(len: usize, entries: &[(usize, f64)]) -> Self {
        let mut values = Array1::zeros(len);
        for &(index, value) in entries {
            values[index] = value;
        }
        Self { values }
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn resize(&mut self, len: usize) {
        let keep = len.min(self.values.len());
        let mut resized = Array1::zeros(len);
        resized
            .slice_mut(s![..keep])
            .assign(&self.values.slice(s![..keep]));
        self.values = resized;
    }

    fn values(&self, start: usize, end: usize) -> Array1<f64> {
        self.values.slice(s![start..end]).to_owned()
    }

    fn assign(&mut self, start: usize, values: ArrayView1<'_, f64>) {
        self.values
            .slice_mut(s![start..start + values.len()])
            .assign(&values);
    }

    fn increment(&mut self, start: usize, values: ArrayView1<'_, f64>) {
        let mut target = self.values.slice_mut(s![start..start + values.len()]);
        target += &values;
    }

    fn total(&self) -> f64 {
        self.values.sum()
    }

    fn nonzero(&self) -> Vec<(usize, f64)> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, v)| (i, *v))
            .collect()
    }

    fn map<F: Fn(f64) -> f64>(&self, func: F) -> Self {
        Self {
            values: self.values.mapv(func),
        }
    }

    fn zip_with<F: Fn(f64, f64) -> f64>(&self, other: &Self, func: F) -> Self {
        crate::ensure_eq!(self.len(), other.len());
        let values = Zip::from(&self.values)
            .and(&other.values)
            .map_collect(|a, b| func(*a, *b));
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BowtieReader;
    use crate::mapping::{center_map, five_prime_map};
    use crate::prelude::*;

    fn seg(start: Position, end: Position, strand: Strand) -> GenomicSegment {
        GenomicSegment::new("chrA", start, end, strand).unwrap()
    }

    fn array() -> DenseGenomeArray {
        DenseGenomeArray::with_lengths(&seqlens!("chrA" => 1000), ArrayConfig::default()).unwrap()
    }

    #[test]
    fn test_fresh_array_is_zero() {
        let mut ga = array();
        for (start, end) in [(0, 10), (500, 1000), (990, 1200)] {
            for strand in Strand::DEFAULT {
                let values = ga.get(&seg(start, end, strand)).unwrap();
                assert_eq!(values.len(), (end - start) as usize);
                assert_eq!(values.sum(), 0.0);
            }
        }
    }

    #[test]
    fn test_set_get_roundtrip() {
        let mut ga = array();
        let vector = Array1::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        for strand in Strand::DEFAULT {
            let region = seg(100, 105, strand);
            ga.set(&region, vector.clone().into()).unwrap();
            assert_eq!(ga.get(&region).unwrap(), vector);
        }
        let region = seg(200, 210, Strand::Plus);
        ga.set(&region, 7.0.into()).unwrap();
        assert_eq!(ga.get(&region).unwrap(), Array1::from_elem(10, 7.0));
    }

    #[test]
    fn test_minus_strand_order() {
        let mut ga = array();
        let region = seg(100, 105, Strand::Minus);
        ga.set_with_order(
            &region,
            Array1::from(vec![100.0, 101.0, 102.0, 103.0, 104.0]).into(),
            false,
        )
        .unwrap();
        let values = ga.get(&region).unwrap();
        assert_eq!(values[0], 104.0);
        assert_eq!(values[4], 100.0);
        let genomic = ga.get_with_order(&region, false).unwrap();
        assert_eq!(genomic[0], 100.0);
    }

    #[test]
    fn test_set_wrong_length() {
        let mut ga = array();
        let result = ga.set(&seg(0, 5, Strand::Plus), vec![1.0, 2.0].into());
        assert!(matches!(
            result,
            Err(GenomeArrayError::ValueLengthMismatch(2, 5))
        ));
    }

    #[test]
    fn test_strand_not_in_array() {
        let mut ga = array();
        let result = ga.set(&seg(0, 5, Strand::Unstranded), 1.0.into());
        assert!(matches!(
            result,
            Err(GenomeArrayError::StrandNotInArray(_, _))
        ));
    }

    #[test]
    fn test_add_accumulates_and_invalidates_sum() {
        let mut ga = array();
        let region = seg(10, 20, Strand::Plus);
        ga.add(&region, 1.0.into()).unwrap();
        assert_eq!(ga.sum().unwrap(), 10.0);
        ga.add(&seg(15, 25, Strand::Plus), 1.0.into()).unwrap();
        assert_eq!(ga.sum().unwrap(), 20.0);
        assert_eq!(ga.get(&seg(15, 16, Strand::Plus)).unwrap()[0], 2.0);
    }

    #[test]
    fn test_add_minus_strand_order() {
        let vector = Array1::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let region = seg(100, 105, Strand::Minus);

        let mut ga = array();
        ga.add(&region, vector.clone().into()).unwrap();
        assert_eq!(ga.get(&region).unwrap(), vector);
        ga.add(&region, vector.clone().into()).unwrap();
        assert_eq!(ga.get(&region).unwrap(), &vector * 2.0);

        let mut ga = array();
        ga.add_with_order(&region, vector.clone().into(), false)
            .unwrap();
        assert_eq!(ga.get_with_order(&region, false).unwrap(), vector);
        assert_eq!(ga.get(&region).unwrap()[0], 5.0);
    }

    const READS: &str = "\
fw\t+\tchrA\t50\tACGTACGTACGTACGTACGT\tIIIIIIIIIIIIIIIIIIII\t0\t
rc\t-\tchrA\t50\tACGTACGTACGTACGTACGT\tIIIIIIIIIIIIIIIIIIII\t0\t
ctr\t+\tchrA\t100\tACGTACGTAC\tIIIIIIIIII\t0\t
";

    #[test]
    fn test_add_from_bowtie_five_prime() {
        let mut ga = array();
        let reads = BowtieReader::new(READS.as_bytes());
        let counted = ga
            .add_from_bowtie(reads, five_prime_map, &MapParams::with_offset(2), 20, None)
            .unwrap();
        assert_eq!(counted, 2);
        assert_eq!(ga.get(&seg(52, 53, Strand::Plus)).unwrap()[0], 1.0);
        assert_eq!(ga.get(&seg(67, 68, Strand::Minus)).unwrap()[0], 1.0);
        assert_eq!(ga.sum().unwrap(), 2.0);
        assert_eq!(ga.nonzero()["chrA"][&Strand::Plus], vec![52]);
        assert_eq!(ga.nonzero()["chrA"][&Strand::Minus], vec![67]);
    }

    #[test]
    fn test_add_from_bowtie_center() {
        let mut ga = array();
        let reads = BowtieReader::new(READS.as_bytes());
        let counted = ga
            .add_from_bowtie(reads, center_map, &MapParams::with_nibble(2), 10, Some(10))
            .unwrap();
        assert_eq!(counted, 1);
        let values = ga.get(&seg(102, 108, Strand::Plus)).unwrap();
        assert!((values.sum() - 1.0).abs() < 1e-12);
        assert!(values.iter().all(|v| (v - 1.0 / 6.0).abs() < 1e-12));
        assert_eq!(ga.nonzero()["chrA"][&Strand::Plus], (102..108).collect::<Vec<_>>());
    }

    #[test]
    fn test_normalization() {
        let mut ga = array();
        ga.set(&seg(0, 1, Strand::Plus), 4.0.into()).unwrap();
        ga.set_sum(2_000_000.0);
        ga.set_normalize(true);
        assert_eq!(ga.get(&seg(0, 1, Strand::Plus)).unwrap()[0], 2.0);
        assert_eq!(ga.sum().unwrap(), 2_000_000.0);
        ga.reset_sum();
        assert_eq!(ga.sum().unwrap(), 4.0);
        ga.set_normalize(false);
        assert_eq!(ga.get(&seg(0, 1, Strand::Plus)).unwrap()[0], 4.0);
    }

    #[test]
    fn test_growth_keeps_values() {
        let mut ga = DenseGenomeArray::new(ArrayConfig::with_strands(&[Strand::Plus]));
        ga.set(&seg(9_999_990, 10_000_000, Strand::Plus), 3.0.into())
            .unwrap();
        ga.set(&seg(5, 6, Strand::Plus), 1.0.into()).unwrap();
        assert_eq!(ga.lengths()["chrA"], 10_000_000);

        ga.set(&seg(15_000_000, 15_000_001, Strand::Plus), 2.0.into())
            .unwrap();
        assert_eq!(ga.lengths()["chrA"], 15_010_001);
        assert_eq!(ga.get(&seg(5, 6, Strand::Plus)).unwrap()[0], 1.0);
        assert_eq!(
            ga.get(&seg(9_999_990, 10_000_000, Strand::Plus)).unwrap().sum(),
            30.0
        );
        assert_eq!(ga.sum().unwrap(), 33.0);
    }

    #[test]
    fn test_growth_is_uniform_over_strands() {
        let mut ga = DenseGenomeArray::new(ArrayConfig::default().min_chr_size(100));
        ga.get(&seg(0, 150, Strand::Minus)).unwrap();
        let buffer_len = |ga: &DenseGenomeArray, strand| ga.buffer("chrA", strand).unwrap().len();
        assert_eq!(buffer_len(&ga, Strand::Plus), 10_150);
        assert_eq!(buffer_len(&ga, Strand::Minus), 10_150);
    }

    #[test]
    fn test_set_chain() {
        let mut ga = array();
        let chain = SegmentChain::new(vec![seg(10, 12, Strand::Minus), seg(20, 23, Strand::Minus)])
            .unwrap();
        ga.set_chain(&chain, vec![1.0, 2.0, 3.0, 4.0, 5.0].into())
            .unwrap();
        // 5' end of a minus-strand chain is its highest position
        assert_eq!(ga.get_with_order(&seg(22, 23, Strand::Minus), false).unwrap()[0], 1.0);
        assert_eq!(ga.get_with_order(&seg(10, 11, Strand::Minus), false).unwrap()[0], 5.0);
        assert_eq!(
            ga.get_chain(&chain).unwrap(),
            Array1::from(vec![1.0, 2.0, 3.0, 4.0, 5.0])
        );
        assert!(ga
            .set_chain(&chain, vec![1.0].into())
            .is_err());
    }

    #[test]
    fn test_nonzero_sorted() {
        let mut ga = array();
        ga.set(&seg(30, 31, Strand::Plus), 1.0.into()).unwrap();
        ga.set(&seg(3, 5, Strand::Plus), 1.0.into()).unwrap();
        let nonzero = ga.nonzero();
        assert_eq!(nonzero["chrA"][&Strand::Plus], vec![3, 4, 30]);
        assert!(nonzero["chrA"][&Strand::Minus].is_empty());
    }

    #[test]
    fn test_len_and_contains() {
        let ga = array();
        assert_eq!(ga.len(), 2000);
        assert!(ga.contains("chrA"));
        assert!(!ga.contains("chrB"));
    }

    #[test]
    fn test_buffer_resize_shrink() {
        let mut buffer = DenseBuffer::from(Array1::from(vec![1.0, 2.0, 3.0]));
        buffer.resize(2);
        assert_eq!(buffer.as_array(), &Array1::from(vec![1.0, 2.0]));
        buffer.resize(4);
        assert_eq!(buffer.nonzero(), vec![(0, 1.0), (1, 2.0)]);
    }
}
