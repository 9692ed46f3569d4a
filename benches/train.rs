use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use cmf::test_utils::clustered_stream;
use cmf::{CmfConfig, CoarseMondrianForest};

const FEATURES: usize = 4;
const LABELS: usize = 3;

fn bench_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("train");

    for &cap_bytes in &[16_384usize, 65_536, 262_144] {
        let data = clustered_stream::<FEATURES>(2_000, LABELS, 7);
        group.bench_with_input(BenchmarkId::from_parameter(cap_bytes), &cap_bytes, |b, &cap_bytes| {
            b.iter(|| {
                let config = CmfConfig::new(1.0, 0.01, 0.1, 10, FEATURES, LABELS, cap_bytes, 42);
                let mut forest: CoarseMondrianForest<FEATURES, LABELS> =
                    CoarseMondrianForest::new(config).unwrap();
                for (x, label) in data.iter() {
                    forest.train(std::hint::black_box(x), *label);
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_train);
criterion_main!(benches);
