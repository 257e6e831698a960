#![no_main]

use libfuzzer_sys::fuzz_target;
use relaygate_chain::btc::{compact_size, parse_envelope, BtcBlockCodec, CompressedBlock};
use relaygate_chain::{BlockCodec, TxLookup};
use relaygate_types::{ShortId, TxHash};

/// Knows every even short ID, and the body of every hash it hands out.
struct HalfKnown;

impl TxLookup for HalfKnown {
    fn hash_for_short_id(&self, short_id: ShortId) -> Option<TxHash> {
        let n = short_id.get();
        (n % 2 == 0).then(|| TxHash::new([n as u8; 32]))
    }

    fn content(&self, hash: &TxHash) -> Option<Vec<u8>> {
        Some(hash.as_bytes()[..4].to_vec())
    }
}

// Broadcast payloads and node-side envelopes are attacker controlled.
fuzz_target!(|data: &[u8]| {
    if let Ok(block) = CompressedBlock::from_bytes(data) {
        assert_eq!(block.header.len(), relaygate_chain::btc::BLOCK_HEADER_LEN);
    }

    let codec = BtcBlockCodec::new(relaygate_chain::btc::network::REGTEST_MAGIC);
    if let Ok(result) = codec.decompress(data, &HalfKnown) {
        assert_eq!(
            result.is_complete(),
            result.missing_short_ids.is_empty() && result.missing_hashes.is_empty()
        );
    }

    let _ = parse_envelope(data);
    if let Ok((_, consumed)) = compact_size::read(data) {
        assert!(consumed <= data.len());
    }
});
