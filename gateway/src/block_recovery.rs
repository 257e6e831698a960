//! Block recovery tracker: holds broadcasts the gateway could not decompress.
//!
//! When a relay broadcast references a short ID the index has never seen, or a
//! hash whose body has not arrived, the original message is parked here keyed
//! by block hash together with the exact set of missing pieces. Every time a
//! short ID or a body arrives, all pending blocks waiting on it are updated.
//! Blocks with nothing left missing move to the recovered queue, from which
//! the session takes them and runs decompression again.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use relaygate_messages::BroadcastMessage;
use relaygate_types::{BlockHash, Clock, ShortId, Timestamp, TxHash};

use crate::error::RecoveryError;

/// Result of a successful [`BlockRecoveryService::register_incomplete`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The block was not pending before.
    Registered,
    /// The block was already pending; the missing sets were merged.
    Merged,
}

/// A broadcast waiting for its missing transactions.
#[derive(Clone, Debug)]
pub struct PendingBlock {
    pub block_hash: BlockHash,
    /// The broadcast as received from the relay.
    pub message: BroadcastMessage,
    pub missing_short_ids: HashSet<ShortId>,
    pub missing_hashes: HashSet<TxHash>,
    pub registered_at: Timestamp,
}

impl PendingBlock {
    pub fn is_resolved(&self) -> bool {
        self.missing_short_ids.is_empty() && self.missing_hashes.is_empty()
    }
}

/// A resolved block waiting to be decompressed again.
///
/// Keeps the time of its first registration so that parking it again does
/// not restart its expiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveredBlock {
    pub message: BroadcastMessage,
    pub registered_at: Timestamp,
}

#[derive(Default)]
struct RecoveryState {
    pending: HashMap<BlockHash, PendingBlock>,
    /// Maps short_id → blocks waiting for it, in registration order.
    by_short_id: HashMap<ShortId, Vec<BlockHash>>,
    /// Maps tx hash → blocks waiting for its body, in registration order.
    by_hash: HashMap<TxHash, Vec<BlockHash>>,
    recovered: VecDeque<RecoveredBlock>,
}

impl RecoveryState {
    fn index_block(&mut self, block_hash: BlockHash, short_ids: &[ShortId], hashes: &[TxHash]) {
        for short_id in short_ids {
            let waiting = self.by_short_id.entry(*short_id).or_default();
            if !waiting.contains(&block_hash) {
                waiting.push(block_hash);
            }
        }
        for hash in hashes {
            let waiting = self.by_hash.entry(*hash).or_default();
            if !waiting.contains(&block_hash) {
                waiting.push(block_hash);
            }
        }
    }

    /// Move a resolved block to the recovered queue.
    fn finish(&mut self, block_hash: &BlockHash) {
        if let Some(block) = self.pending.remove(block_hash) {
            tracing::debug!(block = %block_hash, "all missing transactions received");
            self.recovered.push_back(RecoveredBlock {
                message: block.message,
                registered_at: block.registered_at,
            });
        }
    }

    /// Drop a pending block and every reverse-index reference to it.
    fn discard(&mut self, block_hash: &BlockHash) -> Option<PendingBlock> {
        let block = self.pending.remove(block_hash)?;
        for short_id in &block.missing_short_ids {
            if let Some(waiting) = self.by_short_id.get_mut(short_id) {
                waiting.retain(|h| h != block_hash);
                if waiting.is_empty() {
                    self.by_short_id.remove(short_id);
                }
            }
        }
        for hash in &block.missing_hashes {
            if let Some(waiting) = self.by_hash.get_mut(hash) {
                waiting.retain(|h| h != block_hash);
                if waiting.is_empty() {
                    self.by_hash.remove(hash);
                }
            }
        }
        Some(block)
    }
}

/// Tracker of incomplete blocks, shared by every session of a network.
pub struct BlockRecoveryService {
    state: Mutex<RecoveryState>,
    /// Maximum number of pending blocks (bounds memory under relay spam).
    max_pending: usize,
    clock: Arc<dyn Clock>,
}

impl BlockRecoveryService {
    pub fn new(max_pending: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(RecoveryState::default()),
            max_pending,
            clock,
        }
    }

    /// Park a broadcast that could not be fully decompressed.
    ///
    /// A second registration of a pending block merges the missing sets and
    /// keeps the original registration time.
    pub fn register_incomplete(
        &self,
        block_hash: BlockHash,
        message: BroadcastMessage,
        missing_short_ids: &[ShortId],
        missing_hashes: &[TxHash],
    ) -> Result<RegisterOutcome, RecoveryError> {
        let now = self.clock.now();
        self.register(block_hash, message, now, missing_short_ids, missing_hashes)
    }

    /// Park a recovered block that still has gaps after decompression.
    ///
    /// The block keeps its first registration time, so it expires on the
    /// same schedule as if it had never left the tracker.
    pub fn register_recovered(
        &self,
        block: RecoveredBlock,
        missing_short_ids: &[ShortId],
        missing_hashes: &[TxHash],
    ) -> Result<RegisterOutcome, RecoveryError> {
        self.register(
            block.message.block_hash,
            block.message,
            block.registered_at,
            missing_short_ids,
            missing_hashes,
        )
    }

    fn register(
        &self,
        block_hash: BlockHash,
        message: BroadcastMessage,
        registered_at: Timestamp,
        missing_short_ids: &[ShortId],
        missing_hashes: &[TxHash],
    ) -> Result<RegisterOutcome, RecoveryError> {
        if missing_short_ids.is_empty() && missing_hashes.is_empty() {
            tracing::warn!(block = %block_hash, "incomplete block registered with nothing missing");
            return Err(RecoveryError::NothingMissing(block_hash));
        }

        let mut state = self.state.lock();
        let outcome = match state.pending.get_mut(&block_hash) {
            Some(block) => {
                block.missing_short_ids.extend(missing_short_ids.iter().copied());
                block.missing_hashes.extend(missing_hashes.iter().copied());
                block.registered_at = block.registered_at.min(registered_at);
                RegisterOutcome::Merged
            }
            None => {
                if state.pending.len() >= self.max_pending {
                    return Err(RecoveryError::CapacityReached {
                        max: self.max_pending,
                    });
                }
                state.pending.insert(
                    block_hash,
                    PendingBlock {
                        block_hash,
                        message,
                        missing_short_ids: missing_short_ids.iter().copied().collect(),
                        missing_hashes: missing_hashes.iter().copied().collect(),
                        registered_at,
                    },
                );
                RegisterOutcome::Registered
            }
        };
        state.index_block(block_hash, missing_short_ids, missing_hashes);
        Ok(outcome)
    }

    /// Mark `short_id` as known in every pending block.
    ///
    /// Returns the number of blocks this resolved.
    pub fn check_missing_sid(&self, short_id: ShortId) -> usize {
        let mut state = self.state.lock();
        let Some(waiting) = state.by_short_id.remove(&short_id) else {
            return 0;
        };

        let mut resolved = 0;
        for block_hash in waiting {
            let done = match state.pending.get_mut(&block_hash) {
                Some(block) => {
                    block.missing_short_ids.remove(&short_id);
                    block.is_resolved()
                }
                None => false,
            };
            if done {
                state.finish(&block_hash);
                resolved += 1;
            }
        }
        resolved
    }

    /// Mark the body of `hash` as known in every pending block.
    ///
    /// Returns the number of blocks this resolved.
    pub fn check_missing_tx_hash(&self, hash: TxHash) -> usize {
        let mut state = self.state.lock();
        let Some(waiting) = state.by_hash.remove(&hash) else {
            return 0;
        };

        let mut resolved = 0;
        for block_hash in waiting {
            let done = match state.pending.get_mut(&block_hash) {
                Some(block) => {
                    block.missing_hashes.remove(&hash);
                    block.is_resolved()
                }
                None => false,
            };
            if done {
                state.finish(&block_hash);
                resolved += 1;
            }
        }
        resolved
    }

    /// Take every recovered block, in resolution order.
    pub fn drain_recovered(&self) -> Vec<RecoveredBlock> {
        self.state.lock().recovered.drain(..).collect()
    }

    /// Discard pending blocks registered more than `max_age_secs` ago.
    ///
    /// Returns the number of blocks discarded.
    pub fn clear_expired(&self, max_age_secs: u64, now: Timestamp) -> usize {
        let mut state = self.state.lock();
        let expired: Vec<BlockHash> = state
            .pending
            .values()
            .filter(|block| block.registered_at.has_expired(max_age_secs, now))
            .map(|block| block.block_hash)
            .collect();

        for block_hash in &expired {
            if let Some(block) = state.discard(block_hash) {
                tracing::debug!(
                    block = %block_hash,
                    missing_short_ids = block.missing_short_ids.len(),
                    missing_hashes = block.missing_hashes.len(),
                    "pending block expired"
                );
            }
        }
        expired.len()
    }

    pub fn is_pending(&self, block_hash: &BlockHash) -> bool {
        self.state.lock().pending.contains_key(block_hash)
    }

    /// Snapshot of a pending block.
    pub fn pending_block(&self, block_hash: &BlockHash) -> Option<PendingBlock> {
        self.state.lock().pending.get(block_hash).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn recovered_count(&self) -> usize {
        self.state.lock().recovered.len()
    }
}
