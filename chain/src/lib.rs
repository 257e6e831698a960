//! Chain codecs for the relay gateway.
//!
//! The gateway core never parses blockchain bytes itself. It hands a relay
//! broadcast payload to a [`BlockCodec`] together with read access to its
//! transaction index ([`TxLookup`]) and gets back either the full chain-wire
//! block or the exact set of short IDs and hashes it could not resolve.

pub mod btc;
pub mod error;

use relaygate_types::{BlockHash, ShortId, TxHash};

pub use btc::BtcBlockCodec;
pub use error::ChainError;

/// Read access to the transaction index, as seen by a codec.
pub trait TxLookup {
    /// Hash currently bound to `short_id`, if any.
    fn hash_for_short_id(&self, short_id: ShortId) -> Option<TxHash>;

    /// Raw transaction body for `hash`, if it has been received.
    fn content(&self, hash: &TxHash) -> Option<Vec<u8>>;
}

/// Outcome of one decompression attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decompression {
    /// Full chain-wire block, present only when nothing was missing.
    pub block: Option<Vec<u8>>,
    /// Hash computed from the block header.
    pub block_hash: BlockHash,
    /// Short IDs with no known hash, in first-reference order.
    pub missing_short_ids: Vec<ShortId>,
    /// Hashes with no known content, in first-reference order.
    pub missing_hashes: Vec<TxHash>,
}

impl Decompression {
    pub fn is_complete(&self) -> bool {
        self.block.is_some()
    }
}

/// Chain-specific block and transaction encoding.
pub trait BlockCodec: Send + Sync {
    /// Rebuild the full block behind a relay broadcast payload.
    ///
    /// Unresolvable references are reported in the result, not as errors.
    /// Errors mean the payload itself is unusable.
    fn decompress(&self, payload: &[u8], lookup: &dyn TxLookup)
        -> Result<Decompression, ChainError>;

    /// Wrap a raw transaction in the chain's wire message format.
    fn encode_transaction(&self, contents: &[u8]) -> Vec<u8>;
}
