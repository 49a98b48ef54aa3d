use criterion::{criterion_group, criterion_main, Criterion};
use genomearray::indexmap::IndexMap;
use genomearray::prelude::*;
use genomearray::test_utilities::{random_segment, random_values, NCHROM, NRANDOM_SEGMENTS};

const CHROM_LEN: Position = 1_000_000;

fn random_genome() -> IndexMap<String, Position> {
    (1..=NCHROM)
        .map(|i| (format!("chr{}", i), CHROM_LEN))
        .collect()
}

fn filled<B: StrandBuffer>(segments: &[(GenomicSegment, Vec<f64>)]) -> StrandedArray<B> {
    let mut array =
        StrandedArray::<B>::with_lengths(&random_genome(), ArrayConfig::default()).unwrap();
    for (segment, values) in segments {
        array.add(segment, Values::from(values.clone())).unwrap();
    }
    array
}

fn bench_dense_vs_sparse(c: &mut Criterion) {
    // create the benchmark group
    let mut group = c.benchmark_group("dense_vs_sparse");

    // create the test data
    let segments: Vec<_> = (0..NRANDOM_SEGMENTS)
        .map(|_| {
            let segment = random_segment(CHROM_LEN);
            let values = random_values(segment.len()).to_vec();
            (segment, values)
        })
        .collect();

    // configure the sample size for the group
    group.sample_size(10);

    group.bench_function("dense_fill", |b| {
        b.iter(|| filled::<DenseBuffer>(&segments).nonzero().len());
    });

    group.bench_function("sparse_fill", |b| {
        b.iter(|| filled::<SparseBuffer>(&segments).nonzero().len());
    });

    let mut dense = filled::<DenseBuffer>(&segments);
    group.bench_function("dense_get", |b| {
        b.iter(|| {
            segments
                .iter()
                .map(|(segment, _)| dense.get(segment).unwrap().sum())
                .sum::<f64>()
        });
    });

    let mut sparse = filled::<SparseBuffer>(&segments);
    group.bench_function("sparse_get", |b| {
        b.iter(|| {
            segments
                .iter()
                .map(|(segment, _)| sparse.get(segment).unwrap().sum())
                .sum::<f64>()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_dense_vs_sparse);
criterion_main!(benches);
