//! Synthetic training-stream generators, feature-gated behind `test_utils`
//! (mirrors kiddo's own `test_utils` module, which exists purely to feed
//! benches and integration tests without shipping generator code in the
//! default build).

use rand::{Rng, SeedableRng};

use crate::math::RandomSource;

/// One labelled training point with `F` real-valued features.
pub type Sample<const F: usize> = ([f64; F], usize);

/// Generates `n` points drawn from `label_count` well-separated clusters
/// (one per label, centred at `label * 10.0` along every axis, unit spread),
/// a stand-in for the original benchmark harness's synthetic generators.
pub fn clustered_stream<const F: usize>(n: usize, label_count: usize, seed: u64) -> Vec<Sample<F>> {
    let mut rng = RandomSource::new(seed);
    (0..n)
        .map(|i| {
            let label = i % label_count;
            let centre = label as f64 * 10.0;
            let mut features = [0.0; F];
            for f in features.iter_mut() {
                *f = centre + rng.uniform_range(-1.0, 1.0);
            }
            (features, label)
        })
        .collect()
}

/// Generates `n` points with uniformly random features and labels, useful
/// for worst-case (no learnable structure) arena-pressure benchmarks.
pub fn uniform_random_stream<const F: usize>(n: usize, label_count: usize, seed: u64) -> Vec<Sample<F>> {
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let mut features = [0.0; F];
            for f in features.iter_mut() {
                *f = rng.random_range(0.0..1.0);
            }
            let label = rng.random_range(0..label_count);
            (features, label)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clustered_stream_labels_cycle() {
        let data: Vec<Sample<2>> = clustered_stream(9, 3, 1);
        assert_eq!(data.len(), 9);
        assert_eq!(data[0].1, 0);
        assert_eq!(data[3].1, 0);
    }

    #[test]
    fn uniform_random_stream_has_requested_length() {
        let data: Vec<Sample<3>> = uniform_random_stream(50, 2, 7);
        assert_eq!(data.len(), 50);
    }
}
