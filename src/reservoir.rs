//! Reservoir samplers. Peer component, does not interact with the CMF core.
//!
//! Grounded on `reservoir_sampling.hpp`'s `Reservoir`, `ReservoirSampling`,
//! `ExponentialReservoirSampling` and `chained_reservoir.hpp`'s
//! `ChainedReservoirSampling`. The chained variant's original is a hand-rolled
//! linked list inside a fixed array (manual `next`/`push_on_chain` pointer
//! chasing); here it is rebuilt on a safe `Vec`-backed index chain instead,
//! since the original's raw pointer-in-array pattern has no safe-Rust analogue
//! worth preserving literally (see SPEC_FULL §10).

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Classic reservoir sampling over a fixed-size `[T; N]` backing store, per
/// `reservoir_sampling.hpp::ReservoirSampling`.
#[derive(Debug, Clone)]
pub struct Reservoir<T, const N: usize> {
    items: Vec<T>,
    seen: u64,
    rng: SmallRng,
}

impl<T: Clone, const N: usize> Reservoir<T, N> {
    pub fn new(seed: u64) -> Self {
        Reservoir {
            items: Vec::with_capacity(N),
            seen: 0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// `sample_index`: classic algorithm R. Offers `item` for inclusion.
    pub fn offer(&mut self, item: T) {
        self.seen += 1;
        if self.items.len() < N {
            self.items.push(item);
        } else {
            let j = self.rng.random_range(0..self.seen);
            if (j as usize) < N {
                self.items[j as usize] = item;
            }
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.seen = 0;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T, const N: usize> std::ops::Index<usize> for Reservoir<T, N> {
    type Output = T;
    fn index(&self, i: usize) -> &T {
        &self.items[i]
    }
}

/// Exponential-ratio reservoir sampling, per
/// `reservoir_sampling.hpp::ExponentialReservoirSampling`: uses a filling ratio
/// rather than a plain counter threshold to decide whether to replace a slot.
#[derive(Debug, Clone)]
pub struct ExponentialReservoir<T, const N: usize> {
    items: Vec<T>,
    filling_ratio: f64,
    rng: SmallRng,
}

impl<T: Clone, const N: usize> ExponentialReservoir<T, N> {
    pub fn new(seed: u64) -> Self {
        ExponentialReservoir {
            items: Vec::with_capacity(N),
            filling_ratio: 0.0,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn offer(&mut self, item: T) {
        if self.items.len() < N {
            self.items.push(item);
            self.filling_ratio = self.items.len() as f64 / N as f64;
        } else {
            let u: f64 = self.rng.random();
            if u < self.filling_ratio {
                let idx = self.rng.random_range(0..N);
                self.items[idx] = item;
            }
            self.filling_ratio *= 0.999_f64.max(0.0);
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.filling_ratio = 0.0;
    }
}

/// Chained reservoir sampling grouped by an arbitrary key, rebuilt with safe
/// `Vec<Vec<(Ts, T)>>` chains instead of the original's raw next-index array.
#[derive(Debug, Clone)]
pub struct ChainedReservoir<T, Ts> {
    chains: std::collections::HashMap<u64, Vec<(Ts, T)>>,
    per_chain_capacity: usize,
    rng: SmallRng,
}

impl<T: Clone, Ts: Clone> ChainedReservoir<T, Ts> {
    pub fn new(per_chain_capacity: usize, seed: u64) -> Self {
        ChainedReservoir {
            chains: std::collections::HashMap::new(),
            per_chain_capacity,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn offer(&mut self, key: u64, timestamp: Ts, item: T) {
        let chain = self.chains.entry(key).or_default();
        if chain.len() < self.per_chain_capacity {
            chain.push((timestamp, item));
        } else {
            let j = self.rng.random_range(0..chain.len());
            chain[j] = (timestamp, item);
        }
    }

    pub fn chain(&self, key: u64) -> Option<&[(Ts, T)]> {
        self.chains.get(&key).map(|v| v.as_slice())
    }

    pub fn clear_chain(&mut self, key: u64) {
        self.chains.remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservoir_caps_at_capacity() {
        let mut r: Reservoir<u32, 4> = Reservoir::new(7);
        for i in 0..100u32 {
            r.offer(i);
        }
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn reservoir_keeps_everything_under_capacity() {
        let mut r: Reservoir<u32, 10> = Reservoir::new(1);
        for i in 0..5u32 {
            r.offer(i);
        }
        assert_eq!(r.len(), 5);
        assert_eq!(r.items(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn chained_reservoir_separates_keys() {
        let mut cr: ChainedReservoir<u32, u64> = ChainedReservoir::new(4, 3);
        cr.offer(1, 0, 10);
        cr.offer(2, 0, 20);
        assert_eq!(cr.chain(1).unwrap().len(), 1);
        assert_eq!(cr.chain(2).unwrap().len(), 1);
    }
}
