//! Cuckoo filter. Peer component (§1: "does not interact with CMF").
//!
//! Grounded on `examples/original_source/src/cuckoo_filter.hpp`: bucketed
//! fingerprint storage with two-candidate-bucket relocation on insert. The
//! original packs entries at an arbitrary `entry_size` in bits via manual
//! `get_bit`/`set_bit`/`get_entry`/`set_entry` arithmetic; this crate
//! simplifies fingerprints to byte-aligned `u8`, as real Rust cuckoo-filter
//! crates do, since Rust has no ergonomic arbitrary-bit-width packed storage
//! and the bit-packing is incidental to the algorithm, not its point.

use std::hash::{Hash, Hasher};

const EMPTY: u8 = 0;
const MAX_RELOCATIONS: usize = 500;

/// A cuckoo filter with `bucket_count` buckets of `bucket_size` byte-aligned
/// fingerprint slots each.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CuckooFilter {
    buckets: Vec<[u8; 4]>,
    bucket_size: usize,
    bucket_count: usize,
}

fn hash_u64<T: Hash>(seed: u64, element: &T) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    seed.hash(&mut hasher);
    element.hash(&mut hasher);
    hasher.finish()
}

impl CuckooFilter {
    pub fn new(bucket_count: usize) -> Self {
        CuckooFilter {
            buckets: vec![[EMPTY; 4]; bucket_count],
            bucket_size: 4,
            bucket_count,
        }
    }

    fn fingerprint<T: Hash>(&self, element: &T) -> u8 {
        let fp = (hash_u64(1, element) as u8).max(1); // avoid EMPTY sentinel
        fp
    }

    fn index_of<T: Hash>(&self, element: &T) -> usize {
        (hash_u64(2, element) as usize) % self.bucket_count
    }

    fn alt_index(&self, index: usize, fingerprint: u8) -> usize {
        let h = hash_u64(3, &fingerprint) as usize;
        (index ^ h) % self.bucket_count
    }

    pub fn insert<T: Hash>(&mut self, element: &T) -> bool {
        let fp = self.fingerprint(element);
        let i1 = self.index_of(element);
        let i2 = self.alt_index(i1, fp);

        if self.try_insert_bucket(i1, fp) || self.try_insert_bucket(i2, fp) {
            return true;
        }

        // Relocation loop: kick an existing fingerprint to its alternate
        // bucket, per the classic cuckoo-insert algorithm.
        let mut index = if i1 <= i2 { i1 } else { i2 };
        let mut fingerprint = fp;
        for _ in 0..MAX_RELOCATIONS {
            let slot = index % self.bucket_size;
            let evicted = self.buckets[index][slot];
            self.buckets[index][slot] = fingerprint;
            if evicted == EMPTY {
                return true;
            }
            fingerprint = evicted;
            index = self.alt_index(index, fingerprint);
            if self.try_insert_bucket(index, fingerprint) {
                return true;
            }
        }
        false
    }

    fn try_insert_bucket(&mut self, bucket: usize, fp: u8) -> bool {
        for slot in self.buckets[bucket].iter_mut() {
            if *slot == EMPTY {
                *slot = fp;
                return true;
            }
        }
        false
    }

    pub fn contains<T: Hash>(&self, element: &T) -> bool {
        let fp = self.fingerprint(element);
        let i1 = self.index_of(element);
        let i2 = self.alt_index(i1, fp);
        self.buckets[i1].contains(&fp) || self.buckets[i2].contains(&fp)
    }

    pub fn remove<T: Hash>(&mut self, element: &T) -> bool {
        let fp = self.fingerprint(element);
        let i1 = self.index_of(element);
        let i2 = self.alt_index(i1, fp);
        for bucket in [i1, i2] {
            if let Some(slot) = self.buckets[bucket].iter_mut().find(|s| **s == fp) {
                *slot = EMPTY;
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_contains() {
        let mut cf = CuckooFilter::new(64);
        for i in 0..50u32 {
            assert!(cf.insert(&i));
        }
        for i in 0..50u32 {
            assert!(cf.contains(&i));
        }
    }

    #[test]
    fn remove_clears_membership() {
        let mut cf = CuckooFilter::new(64);
        cf.insert(&42u32);
        assert!(cf.contains(&42u32));
        assert!(cf.remove(&42u32));
        assert!(!cf.contains(&42u32));
    }
}
