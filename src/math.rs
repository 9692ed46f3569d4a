//! Random and math helpers. Component C (§2, §4.B, §4.F).
//!
//! Grounded on `utils.hpp`'s `Utils::pick_from_distribution`,
//! `Utils::turn_array_into_probability` and `Utils::rand_exponential`, with one
//! deliberate deviation: this module uses `f64::exp_m1` (a numerically stable
//! `expm1`) rather than `Utils::expm1`'s `exp(a) - 1`, per the explicit
//! "numerically stable expm1" requirement in §2 component C and the numerical
//! note in SPEC_FULL §4.F.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// A single deterministic random stream owned by the forest. §5: "the random
/// source is a single stream advanced once per stochastic decision."
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: ChaCha8Rng,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        use rand::SeedableRng;
        RandomSource {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draws `u ~ Uniform[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Draws a uniform value in `[lo, hi)`, degrading to `lo` if the interval is
    /// empty or inverted (can happen at numerically degenerate boxes).
    pub fn uniform_range(&mut self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            lo
        } else {
            lo + self.uniform() * (hi - lo)
        }
    }

    pub fn uniform_index(&mut self, n: usize) -> usize {
        if n == 0 {
            0
        } else {
            self.rng.random_range(0..n)
        }
    }

    /// `Utils::rand_exponential`: `-log(1-u)/rate`.
    pub fn exponential(&mut self, rate: f64) -> f64 {
        if rate <= 0.0 {
            return f64::INFINITY;
        }
        let u = self.uniform();
        -(1.0 - u).ln() / rate
    }
}

/// `Utils::turn_array_into_probability`: normalises `values` into a cumulative
/// distribution in place. Returns the pre-normalisation sum.
pub fn turn_array_into_probability(values: &mut [f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    if sum <= 0.0 {
        return sum;
    }
    values[0] /= sum;
    for i in 1..values.len() {
        values[i] = values[i - 1] + values[i] / sum;
    }
    sum
}

/// `Utils::pick_from_distribution`: given a cumulative distribution (as
/// produced by [`turn_array_into_probability`]), picks the first index whose
/// cumulative mass is `>= u`. Per §4.B's tie-break rule, falls back to a
/// uniform choice over `len` if nothing qualifies (numerical collapse).
pub fn pick_from_distribution(cumulative: &[f64], u: f64, rng: &mut RandomSource) -> usize {
    for (i, &c) in cumulative.iter().enumerate() {
        if u <= c {
            return i;
        }
    }
    rng.uniform_index(cumulative.len())
}

/// Numerically stable `expm1`, used throughout the posterior engine instead of
/// `utils.hpp`'s naive `exp(a) - 1` (see module docs).
#[inline]
pub fn expm1(a: f64) -> f64 {
    a.exp_m1()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_array_into_probability_normalises_and_accumulates() {
        let mut v = vec![6.0, 15.0, 9.0];
        let sum = turn_array_into_probability(&mut v);
        assert_eq!(sum, 30.0);
        assert!((v[0] - 0.2).abs() < 1e-12);
        assert!((v[1] - 0.7).abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pick_from_distribution_follows_first_qualifying_index() {
        let cumulative = [0.2, 0.7, 1.0];
        let mut rng = RandomSource::new(1);
        assert_eq!(pick_from_distribution(&cumulative, 0.0, &mut rng), 0);
        assert_eq!(pick_from_distribution(&cumulative, 0.2, &mut rng), 0);
        assert_eq!(pick_from_distribution(&cumulative, 0.5, &mut rng), 1);
        assert_eq!(pick_from_distribution(&cumulative, 1.0, &mut rng), 2);
    }

    #[test]
    fn expm1_matches_naive_for_moderate_inputs() {
        let a = -0.3_f64;
        assert!((expm1(a) - (a.exp() - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn deterministic_given_same_seed() {
        let mut a = RandomSource::new(42);
        let mut b = RandomSource::new(42);
        for _ in 0..10 {
            assert_eq!(a.uniform(), b.uniform());
        }
    }
}
