use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use track_atlas::clustering::{ClusterConfig, KMeans};
use track_atlas::neighbors::NeighborIndex;
use track_atlas::visualization::{Umap, UmapConfig};

fn create_feature_matrix(n_rows: usize, n_features: usize) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 2.0 - 1.0)
}

fn bench_neighbors(c: &mut Criterion) {
    let mut group = c.benchmark_group("neighbors");
    group.sample_size(10);

    for n_rows in [1000, 5000, 10000].iter() {
        let x = create_feature_matrix(*n_rows, 13);

        group.bench_with_input(BenchmarkId::new("kneighbors", n_rows), &x, |b, x| {
            b.iter(|| NeighborIndex::build(black_box(x)).kneighbors(5).unwrap())
        });
    }

    group.finish();
}

fn bench_clustering(c: &mut Criterion) {
    let mut group = c.benchmark_group("clustering");
    group.sample_size(10);

    for n_rows in [1000, 5000, 10000].iter() {
        let x = create_feature_matrix(*n_rows, 13);

        group.bench_with_input(BenchmarkId::new("kmeans_k20", n_rows), &x, |b, x| {
            b.iter(|| KMeans::new(ClusterConfig::default()).fit(black_box(x)).unwrap())
        });
    }

    group.finish();
}

fn bench_embedding(c: &mut Criterion) {
    let mut group = c.benchmark_group("embedding");
    group.sample_size(10);

    let x = create_feature_matrix(2000, 13);
    let config = UmapConfig {
        n_epochs: Some(100),
        ..Default::default()
    };
    group.bench_function("umap_2000", |b| {
        b.iter(|| Umap::new(config.clone()).fit_transform(black_box(&x)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_neighbors, bench_clustering, bench_embedding);
criterion_main!(benches);
