//! SHA-256 hashing for blocks, transactions and wire checksums.

use relaygate_types::{BlockHash, TxHash};
use sha2::{Digest, Sha256};

/// Compute a single SHA-256 digest of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&Sha256::digest(data));
    output
}

/// Compute `SHA-256(SHA-256(data))`, the chain's canonical object hash.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Hash a raw transaction to produce its `TxHash`.
pub fn hash_transaction(tx_bytes: &[u8]) -> TxHash {
    TxHash::new(double_sha256(tx_bytes))
}

/// Hash a serialized block header to produce its `BlockHash`.
pub fn hash_block_header(header: &[u8]) -> BlockHash {
    BlockHash::new(double_sha256(header))
}

/// First four bytes of the double SHA-256, used as the wire message checksum.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = double_sha256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Hex rendering in the byte-reversed order block explorers display.
pub fn display_hex(hash: &[u8; 32]) -> String {
    let mut reversed = *hash;
    reversed.reverse();
    hex::encode(reversed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS_HEADER: &str = "0100000000000000000000000000000000000000000000000000000000000000\
        000000003ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49\
        ffff001d1dac2b7c";

    const GENESIS_COINBASE: &str = "01000000010000000000000000000000000000000000000000000000000000\
        000000000000ffffffff4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368\
        616e63656c6c6f72206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e\
        6b73ffffffff0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a679\
        62e0ea1f61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000";

    #[test]
    fn double_sha256_of_empty_input() {
        assert_eq!(
            hex::encode(double_sha256(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn checksum_is_digest_prefix() {
        assert_eq!(checksum(b""), [0x5d, 0xf6, 0xe0, 0xe2]);
    }

    #[test]
    fn genesis_header_hash() {
        let header = hex::decode(GENESIS_HEADER).unwrap();
        assert_eq!(header.len(), 80);
        let hash = hash_block_header(&header);
        assert_eq!(
            display_hex(hash.as_bytes()),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
    }

    #[test]
    fn genesis_coinbase_hash() {
        let tx = hex::decode(GENESIS_COINBASE).unwrap();
        let hash = hash_transaction(&tx);
        assert_eq!(
            display_hex(hash.as_bytes()),
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b"
        );
    }

    #[test]
    fn single_and_double_differ() {
        assert_ne!(sha256(b"relay"), double_sha256(b"relay"));
    }
}
