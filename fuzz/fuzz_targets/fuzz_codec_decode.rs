#![no_main]

use libfuzzer_sys::fuzz_target;

// Relay frames come straight off the network: decoding must never panic, and
// anything that decodes must survive a re-encode.
fuzz_target!(|data: &[u8]| {
    // 1. Unframed body: tag byte + bincode payload.
    if let Ok(message) = relaygate_protocol::codec::decode(data) {
        let encoded = relaygate_protocol::codec::encode(&message)
            .expect("decoded message must re-encode");
        let (decoded, consumed) = relaygate_protocol::codec::decode_framed(&encoded)
            .expect("re-encoded frame must decode");
        assert_eq!(decoded, message);
        assert_eq!(consumed, encoded.len());
    }

    // 2. Length-prefixed frame.
    if let Ok((_, consumed)) = relaygate_protocol::codec::decode_framed(data) {
        assert!(consumed <= data.len());
    }

    // 3. Length prefix alone.
    if data.len() >= 4 {
        let _ = relaygate_protocol::codec::body_len([data[0], data[1], data[2], data[3]]);
    }
});
