//! Bloom filter. Peer component (§1: "does not interact with CMF").
//!
//! Grounded on `examples/original_source/bloom_filter.hpp`: a byte-packed bit
//! array with a configurable number of hash functions. The original threads a
//! raw function-pointer array through the template; here each "hash function"
//! is simply the element's [`std::hash::Hash`] implementation combined with a
//! per-slot seed, which is the idiomatic Rust equivalent of swapping out hash
//! functions.

use std::hash::{Hash, Hasher};

/// A fixed-size Bloom filter over `bit_size` bits using `hash_count`
/// independently-seeded hashes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BloomFilter {
    bits: Vec<u8>,
    bit_size: usize,
    hash_count: usize,
}

impl BloomFilter {
    pub fn new(bit_size: usize, hash_count: usize) -> Self {
        BloomFilter {
            bits: vec![0u8; bit_size.div_ceil(8)],
            bit_size,
            hash_count: hash_count.max(1),
        }
    }

    fn hash_indices<T: Hash>(&self, element: &T) -> impl Iterator<Item = usize> + '_ {
        (0..self.hash_count).map(move |seed| {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            seed.hash(&mut hasher);
            element.hash(&mut hasher);
            (hasher.finish() as usize) % self.bit_size
        })
    }

    fn set_bit_to_one(&mut self, index: usize) {
        self.bits[index / 8] |= 1 << (index % 8);
    }

    fn get_bit(&self, index: usize) -> bool {
        (self.bits[index / 8] >> (index % 8)) & 1 == 1
    }

    pub fn add<T: Hash>(&mut self, element: &T) {
        let indices: Vec<usize> = self.hash_indices(element).collect();
        for idx in indices {
            self.set_bit_to_one(idx);
        }
    }

    pub fn lookup<T: Hash>(&self, element: &T) -> bool {
        self.hash_indices(element).all(|idx| self.get_bit(idx))
    }

    pub fn clear(&mut self) {
        self.bits.iter_mut().for_each(|b| *b = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_everything_added() {
        let mut bf = BloomFilter::new(256, 3);
        for i in 0..20 {
            bf.add(&i);
        }
        for i in 0..20 {
            assert!(bf.lookup(&i));
        }
    }

    #[test]
    fn clear_removes_membership() {
        let mut bf = BloomFilter::new(256, 3);
        bf.add(&"hello");
        assert!(bf.lookup(&"hello"));
        bf.clear();
        assert!(!bf.lookup(&"hello"));
    }
}
