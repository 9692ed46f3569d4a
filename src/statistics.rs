//! Pluggable per-tree statistics scorer. §3 TreeBase, §6 peer components.
//!
//! `ErrorRate` and `Kappa` are grounded directly on `metrics.hpp`'s
//! `ErrorMetrics`/`KappaMetrics`. `Reservoir` has no literal counterpart in
//! `metrics.hpp` (no reservoir-based metrics class exists in the original); it
//! is derived by applying `reservoir_sampling.hpp`'s classic reservoir sampler
//! to a running sample of per-point correctness, then scoring as the sample
//! mean error rate. This is noted in DESIGN.md as an extrapolation rather than
//! a literal translation.

use crate::reservoir::Reservoir;

/// A pluggable scorer exposing the spec's peer-collaborator surface
/// (`update`/`score`/`reset`, §6).
#[derive(Debug, Clone)]
pub enum Statistics {
    ErrorRate(ErrorRate),
    Kappa(Kappa),
    Reservoir(ReservoirScore),
}

impl Statistics {
    pub fn error_rate() -> Self {
        Statistics::ErrorRate(ErrorRate::default())
    }

    pub fn kappa(label_count: usize) -> Self {
        Statistics::Kappa(Kappa::new(label_count))
    }

    pub fn reservoir(sample_size: usize, seed: u64) -> Self {
        Statistics::Reservoir(ReservoirScore::new(sample_size, seed))
    }

    pub fn update(&mut self, truth: usize, prediction: usize) {
        match self {
            Statistics::ErrorRate(s) => s.update(truth, prediction),
            Statistics::Kappa(s) => s.update(truth, prediction),
            Statistics::Reservoir(s) => s.update(truth, prediction),
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            Statistics::ErrorRate(s) => s.score(),
            Statistics::Kappa(s) => s.score(),
            Statistics::Reservoir(s) => s.score(),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Statistics::ErrorRate(s) => s.reset(),
            Statistics::Kappa(s) => s.reset(),
            Statistics::Reservoir(s) => s.reset(),
        }
    }
}

/// `metrics.hpp::ErrorMetrics`.
#[derive(Debug, Clone, Default)]
pub struct ErrorRate {
    count: u64,
    error_count: u64,
}

impl ErrorRate {
    pub fn update(&mut self, truth: usize, prediction: usize) {
        self.count += 1;
        if truth != prediction {
            self.error_count += 1;
        }
    }

    pub fn score(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.error_count as f64 / self.count as f64
        }
    }

    pub fn increase_error(&mut self, c: u64) {
        self.count += c;
        self.error_count += c;
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.error_count = 0;
    }
}

/// `metrics.hpp::KappaMetrics`: Cohen's kappa over a confusion matrix.
#[derive(Debug, Clone)]
pub struct Kappa {
    confusion: Vec<u64>,
    label_count: usize,
    total: u64,
}

impl Kappa {
    pub fn new(label_count: usize) -> Self {
        Kappa {
            confusion: vec![0u64; label_count * label_count],
            label_count,
            total: 0,
        }
    }

    fn idx(&self, truth: usize, prediction: usize) -> usize {
        truth * self.label_count + prediction
    }

    pub fn update(&mut self, truth: usize, prediction: usize) {
        if truth < self.label_count && prediction < self.label_count {
            let idx = self.idx(truth, prediction);
            self.confusion[idx] += 1;
            self.total += 1;
        }
    }

    fn kappa(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let mut diagonal = 0.0f64;
        let mut sum_colrow = 0.0f64;
        for i in 0..self.label_count {
            diagonal += self.confusion[self.idx(i, i)] as f64;
            let mut sum_col = 0.0f64;
            let mut sum_row = 0.0f64;
            for j in 0..self.label_count {
                sum_col += self.confusion[self.idx(i, j)] as f64;
                sum_row += self.confusion[self.idx(j, i)] as f64;
            }
            sum_colrow += sum_col * sum_row;
        }
        let total = self.total as f64;
        let denom = total * total - sum_colrow;
        if denom.abs() < f64::EPSILON {
            0.0
        } else {
            (total * diagonal - sum_colrow) / denom
        }
    }

    pub fn score(&self) -> f64 {
        (self.kappa() * -1.0 + 1.0) / 2.0
    }

    pub fn reset(&mut self) {
        self.confusion.iter_mut().for_each(|c| *c = 0);
        self.total = 0;
    }
}

/// Reservoir-sampled running error rate; see module docs for grounding.
#[derive(Debug, Clone)]
pub struct ReservoirScore {
    correct: Reservoir<bool, 256>,
}

impl ReservoirScore {
    pub fn new(_sample_size: usize, seed: u64) -> Self {
        ReservoirScore {
            correct: Reservoir::new(seed),
        }
    }

    pub fn update(&mut self, truth: usize, prediction: usize) {
        self.correct.offer(truth == prediction);
    }

    pub fn score(&self) -> f64 {
        let items = self.correct.items();
        if items.is_empty() {
            return 0.0;
        }
        let wrong = items.iter().filter(|&&c| !c).count();
        wrong as f64 / items.len() as f64
    }

    pub fn reset(&mut self) {
        self.correct.clear();
    }
}
