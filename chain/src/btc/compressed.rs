//! Compressed block format and the Bitcoin block codec.
//!
//! A relay broadcast payload carries the 80-byte block header and, for each
//! transaction in block order, either the relay-assigned short ID or the full
//! transaction bytes (for transactions the relay expects the gateway not to
//! know yet).

use std::collections::HashSet;

use relaygate_crypto::hash_block_header;
use relaygate_types::{ShortId, TxHash};
use serde::{Deserialize, Serialize};

use super::{compact_size, envelope};
use crate::{BlockCodec, ChainError, Decompression, TxLookup};

/// Serialized block header length.
pub const BLOCK_HEADER_LEN: usize = 80;

/// One transaction slot of a compressed block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressedTx {
    ShortId(ShortId),
    Full(Vec<u8>),
}

/// Relay-side representation of a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedBlock {
    pub header: Vec<u8>,
    pub entries: Vec<CompressedTx>,
}

impl CompressedBlock {
    pub fn new(header: Vec<u8>, entries: Vec<CompressedTx>) -> Self {
        Self { header, entries }
    }

    /// Encode as a broadcast payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ChainError> {
        bincode::serialize(self).map_err(|e| ChainError::Malformed(e.to_string()))
    }

    /// Decode a broadcast payload, checking the header length.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, ChainError> {
        let block: Self =
            bincode::deserialize(payload).map_err(|e| ChainError::Malformed(e.to_string()))?;
        if block.header.len() != BLOCK_HEADER_LEN {
            return Err(ChainError::HeaderLength {
                expected: BLOCK_HEADER_LEN,
                actual: block.header.len(),
            });
        }
        Ok(block)
    }
}

/// Build a broadcast payload from a raw header and transaction slots.
pub fn compress(header: &[u8], entries: Vec<CompressedTx>) -> Result<Vec<u8>, ChainError> {
    CompressedBlock::new(header.to_vec(), entries).to_bytes()
}

/// Codec for Bitcoin-style chains: double SHA-256 identities and the
/// magic/command/checksum message envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BtcBlockCodec {
    magic: u32,
}

impl BtcBlockCodec {
    pub fn new(magic: u32) -> Self {
        Self { magic }
    }

    pub fn magic(&self) -> u32 {
        self.magic
    }
}

impl BlockCodec for BtcBlockCodec {
    fn decompress(
        &self,
        payload: &[u8],
        lookup: &dyn TxLookup,
    ) -> Result<Decompression, ChainError> {
        let compressed = CompressedBlock::from_bytes(payload)?;
        let block_hash = hash_block_header(&compressed.header);

        let mut txs: Vec<Vec<u8>> = Vec::with_capacity(compressed.entries.len());
        let mut missing_short_ids = Vec::new();
        let mut missing_hashes = Vec::new();
        let mut seen_short_ids: HashSet<ShortId> = HashSet::new();
        let mut seen_hashes: HashSet<TxHash> = HashSet::new();

        for entry in compressed.entries {
            match entry {
                CompressedTx::Full(bytes) => txs.push(bytes),
                CompressedTx::ShortId(short_id) => match lookup.hash_for_short_id(short_id) {
                    None => {
                        if seen_short_ids.insert(short_id) {
                            missing_short_ids.push(short_id);
                        }
                    }
                    Some(hash) => match lookup.content(&hash) {
                        Some(bytes) => txs.push(bytes),
                        None => {
                            if seen_hashes.insert(hash) {
                                missing_hashes.push(hash);
                            }
                        }
                    },
                },
            }
        }

        let block = if missing_short_ids.is_empty() && missing_hashes.is_empty() {
            let body_len: usize = txs.iter().map(Vec::len).sum();
            let mut block_payload = Vec::with_capacity(BLOCK_HEADER_LEN + 9 + body_len);
            block_payload.extend_from_slice(&compressed.header);
            compact_size::write(&mut block_payload, txs.len() as u64);
            for tx in &txs {
                block_payload.extend_from_slice(tx);
            }
            Some(envelope::wrap(self.magic, "block", &block_payload))
        } else {
            None
        };

        Ok(Decompression {
            block,
            block_hash,
            missing_short_ids,
            missing_hashes,
        })
    }

    fn encode_transaction(&self, contents: &[u8]) -> Vec<u8> {
        envelope::wrap(self.magic, "tx", contents)
    }
}
