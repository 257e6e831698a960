//! Transaction short-ID index.
//!
//! The relay network refers to transactions by small integer short IDs. This
//! index keeps three facts per transaction hash: which short IDs the relay has
//! bound to it, its raw body once it has been delivered, and when either last
//! changed. It is shared by every relay session of a network, so every
//! operation takes the lock exactly once.
//!
//! Invariants:
//! - `short_id -> hash` is a function: a short ID names at most one hash.
//! - A hash may hold any number of short IDs, earliest assignment first.
//! - When a hash loses its last short ID its body is dropped as well.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use relaygate_chain::TxLookup;
use relaygate_types::{Clock, ShortId, Timestamp, TxHash};

/// Result of [`TransactionService::assign_short_id`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOutcome {
    /// The short ID was free and is now bound to the hash.
    Assigned,
    /// The short ID was already bound to this hash.
    Unchanged,
    /// The short ID moved here from another hash.
    Reassigned { previous: TxHash },
}

#[derive(Clone, Debug)]
struct TxEntry {
    short_ids: Vec<ShortId>,
    contents: Option<Vec<u8>>,
    touched_at: Timestamp,
}

impl TxEntry {
    fn new(now: Timestamp) -> Self {
        Self {
            short_ids: Vec::new(),
            contents: None,
            touched_at: now,
        }
    }
}

#[derive(Default)]
struct TxIndex {
    entries: HashMap<TxHash, TxEntry>,
    short_id_to_hash: HashMap<ShortId, TxHash>,
}

impl TxIndex {
    fn assign(&mut self, hash: TxHash, short_id: ShortId, now: Timestamp) -> AssignOutcome {
        let outcome = match self.short_id_to_hash.get(&short_id) {
            Some(bound) if *bound == hash => AssignOutcome::Unchanged,
            Some(bound) => {
                let previous = *bound;
                self.detach(previous, short_id);
                AssignOutcome::Reassigned { previous }
            }
            None => AssignOutcome::Assigned,
        };

        let entry = self.entries.entry(hash).or_insert_with(|| TxEntry::new(now));
        entry.touched_at = now;
        if outcome != AssignOutcome::Unchanged {
            entry.short_ids.push(short_id);
            self.short_id_to_hash.insert(short_id, hash);
        }
        outcome
    }

    /// Unbind `short_id` from `hash`, purging the entry if it was the last one.
    fn detach(&mut self, hash: TxHash, short_id: ShortId) {
        self.short_id_to_hash.remove(&short_id);
        if let Some(entry) = self.entries.get_mut(&hash) {
            entry.short_ids.retain(|sid| *sid != short_id);
            if entry.short_ids.is_empty() {
                self.entries.remove(&hash);
            }
        }
    }
}

/// Shared short-ID index for one relay network.
pub struct TransactionService {
    index: RwLock<TxIndex>,
    clock: Arc<dyn Clock>,
}

impl TransactionService {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            index: RwLock::new(TxIndex::default()),
            clock,
        }
    }

    /// Bind `short_id` to `hash`.
    ///
    /// Idempotent for a pair that is already bound. If the short ID belonged
    /// to another hash it is moved, and the other hash is purged when this
    /// was its last short ID.
    pub fn assign_short_id(&self, hash: TxHash, short_id: ShortId) -> AssignOutcome {
        let now = self.clock.now();
        let outcome = self.index.write().assign(hash, short_id, now);
        if let AssignOutcome::Reassigned { previous } = outcome {
            tracing::debug!(
                short_id = %short_id,
                from = %previous,
                to = %hash,
                "short ID reassigned"
            );
        }
        outcome
    }

    /// Bind `short_id` to `hash` only if the hash has no short ID yet.
    ///
    /// Returns `true` if an assignment was made.
    pub fn assign_if_unassigned(&self, hash: TxHash, short_id: ShortId) -> bool {
        let now = self.clock.now();
        let mut index = self.index.write();
        let has_short_id = index
            .entries
            .get(&hash)
            .is_some_and(|entry| !entry.short_ids.is_empty());
        if has_short_id {
            return false;
        }
        index.assign(hash, short_id, now);
        true
    }

    /// Earliest short ID still bound to `hash`.
    pub fn lookup_short_id(&self, hash: &TxHash) -> Option<ShortId> {
        self.index
            .read()
            .entries
            .get(hash)
            .and_then(|entry| entry.short_ids.first().copied())
    }

    pub fn hash_for_short_id(&self, short_id: ShortId) -> Option<TxHash> {
        self.index.read().short_id_to_hash.get(&short_id).copied()
    }

    /// Store the body of `hash`, replacing any earlier one.
    pub fn store_content(&self, hash: TxHash, contents: Vec<u8>) {
        let now = self.clock.now();
        let mut index = self.index.write();
        let entry = index.entries.entry(hash).or_insert_with(|| TxEntry::new(now));
        entry.contents = Some(contents);
        entry.touched_at = now;
    }

    /// Store the body of `hash` unless one is already known.
    ///
    /// Returns `true` if the body was stored.
    pub fn store_content_if_absent(&self, hash: TxHash, contents: Vec<u8>) -> bool {
        let now = self.clock.now();
        let mut index = self.index.write();
        let entry = index.entries.entry(hash).or_insert_with(|| TxEntry::new(now));
        if entry.contents.is_some() {
            return false;
        }
        entry.contents = Some(contents);
        entry.touched_at = now;
        true
    }

    pub fn get_content(&self, hash: &TxHash) -> Option<Vec<u8>> {
        self.index
            .read()
            .entries
            .get(hash)
            .and_then(|entry| entry.contents.clone())
    }

    pub fn has_content(&self, hash: &TxHash) -> bool {
        self.index
            .read()
            .entries
            .get(hash)
            .is_some_and(|entry| entry.contents.is_some())
    }

    /// Hash and body behind `short_id`, if both are known.
    pub fn resolve(&self, short_id: ShortId) -> Option<(TxHash, Vec<u8>)> {
        let index = self.index.read();
        let hash = index.short_id_to_hash.get(&short_id)?;
        let contents = index.entries.get(hash)?.contents.clone()?;
        Some((*hash, contents))
    }

    /// Unbind `short_id`. Returns the hash it was bound to.
    pub fn remove_short_id(&self, short_id: ShortId) -> Option<TxHash> {
        let mut index = self.index.write();
        let hash = index.short_id_to_hash.get(&short_id).copied()?;
        index.detach(hash, short_id);
        Some(hash)
    }

    /// Number of bound short IDs.
    pub fn short_id_count(&self) -> usize {
        self.index.read().short_id_to_hash.len()
    }

    /// Number of hashes with a stored body.
    pub fn content_count(&self) -> usize {
        self.index
            .read()
            .entries
            .values()
            .filter(|entry| entry.contents.is_some())
            .count()
    }

    /// Drop every entry untouched for `max_age_secs`, with all its short IDs.
    ///
    /// Returns the number of entries removed.
    pub fn expire_older_than(&self, max_age_secs: u64, now: Timestamp) -> usize {
        let mut index = self.index.write();
        let TxIndex {
            entries,
            short_id_to_hash,
        } = &mut *index;

        let before = entries.len();
        entries.retain(|_, entry| {
            let expired = entry.touched_at.has_expired(max_age_secs, now);
            if expired {
                for short_id in &entry.short_ids {
                    short_id_to_hash.remove(short_id);
                }
            }
            !expired
        });
        before - entries.len()
    }
}

impl TxLookup for TransactionService {
    fn hash_for_short_id(&self, short_id: ShortId) -> Option<TxHash> {
        TransactionService::hash_for_short_id(self, short_id)
    }

    fn content(&self, hash: &TxHash) -> Option<Vec<u8>> {
        self.get_content(hash)
    }
}
