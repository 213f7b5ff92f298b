//! Bounded known-hash membership cache.

use std::collections::{HashSet, VecDeque};

use plotd_consensus::Hash256;

/// Insertion-ordered set of hashes with a hard capacity. Inserting at the
/// cap evicts the oldest entries, so memory stays bounded no matter what a
/// peer announces.
pub struct KnownCache {
    set: HashSet<Hash256>,
    order: VecDeque<Hash256>,
    capacity: usize,
}

impl KnownCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.set.contains(hash)
    }

    pub fn insert(&mut self, hash: Hash256) {
        if self.set.contains(&hash) {
            return;
        }
        while self.set.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.set.remove(&oldest);
        }
        self.set.insert(hash);
        self.order.push_back(hash);
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(tag: u8) -> Hash256 {
        [tag; 32]
    }

    #[test]
    fn insert_and_membership() {
        let mut cache = KnownCache::new(4);
        cache.insert(hash(1));
        cache.insert(hash(1));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&hash(1)));
        assert!(!cache.contains(&hash(2)));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut cache = KnownCache::new(3);
        for tag in 1..=3 {
            cache.insert(hash(tag));
        }
        cache.insert(hash(4));
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains(&hash(1)));
        assert!(cache.contains(&hash(2)));
        assert!(cache.contains(&hash(4)));
    }
}
