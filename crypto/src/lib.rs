//! Cryptographic primitives for the relay gateway.
//!
//! Everything the gateway hashes uses the chain's SHA-256 construction:
//! transaction and block identities are double SHA-256 digests, and wire
//! envelopes carry a four-byte double SHA-256 checksum.

pub mod hash;

pub use hash::{
    checksum, display_hex, double_sha256, hash_block_header, hash_transaction, sha256,
};
