//! Benchmarks for exact search

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use flatknn::{FlatIndex, Index, RefineFlatIndex, RefineParams, SortedAxisIndex, SortedAxisParams};

fn create_random_vectors(n: usize, dim: usize) -> Vec<f32> {
    (0..n * dim).map(|_| rand::random::<f32>()).collect()
}

fn benchmark_flat_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_search");
    let queries = create_random_vectors(16, 128);

    for size in [1000, 10000, 100000].iter() {
        let mut index = FlatIndex::l2(128).unwrap();
        index.add(&create_random_vectors(*size, 128)).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| index.search_knn(black_box(&queries), black_box(10)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_refine_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("refine_search");
    let data = create_random_vectors(10000, 128);
    let queries = create_random_vectors(16, 128);

    for k_factor in [1.0f32, 4.0, 16.0].iter() {
        let mut index =
            RefineFlatIndex::with_params(FlatIndex::l2(128).unwrap(), RefineParams::new(*k_factor))
                .unwrap();
        index.add(&data).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(k_factor), k_factor, |b, _| {
            b.iter(|| index.search_knn(black_box(&queries), black_box(10)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_sorted_axis(c: &mut Criterion) {
    let mut group = c.benchmark_group("sorted_axis_vs_flat");
    let queries = create_random_vectors(1000, 1);

    for size in [10000, 1000000].iter() {
        let values = create_random_vectors(*size, 1);
        let mut sorted = SortedAxisIndex::new(SortedAxisParams::default()).unwrap();
        sorted.add(&values).unwrap();
        let mut flat = FlatIndex::l2(1).unwrap();
        flat.add(&values).unwrap();

        group.bench_with_input(BenchmarkId::new("sorted_axis", size), size, |b, _| {
            b.iter(|| sorted.search_knn(black_box(&queries), black_box(10)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("flat", size), size, |b, _| {
            b.iter(|| flat.search_knn(black_box(&queries), black_box(10)).unwrap());
        });
    }

    group.finish();
}

fn benchmark_update_permutation(c: &mut Criterion) {
    let values = create_random_vectors(1000000, 1);
    let mut index = SortedAxisIndex::new(SortedAxisParams::new(false)).unwrap();
    index.add(&values).unwrap();

    c.bench_function("update_permutation_1m", |b| {
        b.iter(|| index.update_permutation());
    });
}

criterion_group!(
    benches,
    benchmark_flat_search,
    benchmark_refine_search,
    benchmark_sorted_axis,
    benchmark_update_permutation
);
criterion_main!(benches);
