//! Rolling set of blocks already forwarded to the local node.
//!
//! Relays may broadcast the same block more than once, and a recovered block
//! may race a fresh broadcast. The session checks this set before doing any
//! work so the node never receives a block twice.

use std::collections::{HashSet, VecDeque};

use relaygate_types::BlockHash;

/// Default capacity: remember the last 1 024 forwarded blocks.
pub const DEFAULT_RECENT_BLOCK_CAPACITY: usize = 1_024;

/// Bounded set of recently forwarded block hashes.
///
/// Oldest entries are evicted first once `capacity` is reached.
pub struct RecentBlocks {
    capacity: usize,
    hashes: HashSet<BlockHash>,
    order: VecDeque<BlockHash>,
}

impl RecentBlocks {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            hashes: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.hashes.contains(hash)
    }

    /// Record a forwarded block.
    ///
    /// Returns `false` if it was already recorded. A zero capacity keeps
    /// nothing, so every insert succeeds.
    pub fn insert(&mut self, hash: BlockHash) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.hashes.contains(&hash) {
            return false;
        }
        if self.hashes.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.hashes.remove(&old);
            }
        }
        self.hashes.insert(hash);
        self.order.push_back(hash);
        true
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl Default for RecentBlocks {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_BLOCK_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(b: u8) -> BlockHash {
        BlockHash::new([b; 32])
    }

    #[test]
    fn new_set_is_empty() {
        let recent = RecentBlocks::new(4);
        assert!(recent.is_empty());
        assert!(!recent.contains(&hash(1)));
    }

    #[test]
    fn second_insert_reports_duplicate() {
        let mut recent = RecentBlocks::new(4);
        assert!(recent.insert(hash(1)));
        assert!(!recent.insert(hash(1)));
        assert!(recent.contains(&hash(1)));
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn evicts_oldest_when_at_capacity() {
        let mut recent = RecentBlocks::new(2);
        recent.insert(hash(1));
        recent.insert(hash(2));
        recent.insert(hash(3));
        assert!(!recent.contains(&hash(1)));
        assert!(recent.contains(&hash(2)));
        assert!(recent.contains(&hash(3)));
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn zero_capacity_disables_dedup() {
        let mut recent = RecentBlocks::new(0);
        assert!(recent.insert(hash(1)));
        assert!(recent.insert(hash(1)));
        assert!(recent.is_empty());
    }
}
