use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use cmf::test_utils::clustered_stream;
use cmf::{CmfConfig, CoarseMondrianForest};

const FEATURES: usize = 4;
const LABELS: usize = 3;

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");

    for &tree_count in &[1usize, 10, 50] {
        let config = CmfConfig::new(1.0, 0.01, 0.1, tree_count, FEATURES, LABELS, 262_144, 42);
        let mut forest: CoarseMondrianForest<FEATURES, LABELS> =
            CoarseMondrianForest::new(config).unwrap();
        for (x, label) in clustered_stream::<FEATURES>(2_000, LABELS, 7) {
            forest.train(&x, label);
        }
        let query = [5.0, 5.0, 5.0, 5.0];

        group.bench_with_input(BenchmarkId::from_parameter(tree_count), &tree_count, |b, _| {
            b.iter(|| forest.predict(std::hint::black_box(&query)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_predict);
criterion_main!(benches);
