//! Relay frame codec.
//!
//! A frame is a 4-byte big-endian body length followed by the body. The body
//! starts with the one-byte [`MessageType`] tag; the rest is the bincode
//! encoding of that type's payload struct (empty for `ack`).

use relaygate_messages::{MessageType, RelayMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::ProtocolError;

/// Maximum message body size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024; // 16 MiB

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Encode a message into a complete frame (length prefix + body).
pub fn encode(message: &RelayMessage) -> Result<Vec<u8>, ProtocolError> {
    let body = encode_body(message)?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: body.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut frame = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Encode the frame body (tag + payload) without the length prefix.
pub fn encode_body(message: &RelayMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut body = vec![message.message_type().tag()];
    match message {
        RelayMessage::Hello(m) => append(&mut body, m)?,
        RelayMessage::Ack => {}
        RelayMessage::Broadcast(m) => append(&mut body, m)?,
        RelayMessage::TxAssign(m) => append(&mut body, m)?,
        RelayMessage::Tx(m) => append(&mut body, m)?,
        RelayMessage::Txs(m) => append(&mut body, m)?,
        RelayMessage::GetTxs(m) => append(&mut body, m)?,
    }
    Ok(body)
}

/// Decode a frame body (tag + payload).
pub fn decode(body: &[u8]) -> Result<RelayMessage, ProtocolError> {
    let (&tag, payload) = body
        .split_first()
        .ok_or_else(|| ProtocolError::Malformed("empty message body".into()))?;
    let message_type =
        MessageType::from_tag(tag).ok_or(ProtocolError::UnknownMessageType(tag))?;

    let message = match message_type {
        MessageType::Hello => RelayMessage::Hello(payload_of(payload)?),
        MessageType::Ack => {
            if !payload.is_empty() {
                return Err(ProtocolError::Malformed("ack carries a payload".into()));
            }
            RelayMessage::Ack
        }
        MessageType::Broadcast => RelayMessage::Broadcast(payload_of(payload)?),
        MessageType::TxAssign => RelayMessage::TxAssign(payload_of(payload)?),
        MessageType::Tx => RelayMessage::Tx(payload_of(payload)?),
        MessageType::Txs => RelayMessage::Txs(payload_of(payload)?),
        MessageType::GetTxs => RelayMessage::GetTxs(payload_of(payload)?),
    };
    Ok(message)
}

/// Validate a length prefix read off the wire and return the body length.
pub fn body_len(prefix: [u8; LENGTH_PREFIX_LEN]) -> Result<usize, ProtocolError> {
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}

/// Decode one frame from the front of `data`.
///
/// Returns the message and the number of bytes consumed.
pub fn decode_framed(data: &[u8]) -> Result<(RelayMessage, usize), ProtocolError> {
    let prefix: [u8; LENGTH_PREFIX_LEN] = data
        .get(..LENGTH_PREFIX_LEN)
        .and_then(|p| p.try_into().ok())
        .ok_or(ProtocolError::Truncated {
            needed: LENGTH_PREFIX_LEN,
            available: data.len(),
        })?;
    let len = body_len(prefix)?;
    let end = LENGTH_PREFIX_LEN + len;
    let body = data.get(LENGTH_PREFIX_LEN..end).ok_or(ProtocolError::Truncated {
        needed: end,
        available: data.len(),
    })?;
    Ok((decode(body)?, end))
}

fn append<T: Serialize>(body: &mut Vec<u8>, value: &T) -> Result<(), ProtocolError> {
    bincode::serialize_into(body, value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

fn payload_of<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    bincode::deserialize(payload).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_messages::{BroadcastMessage, GetTxsMessage, TxDetails, TxsMessage};
    use relaygate_types::{BlockHash, NetworkNum, ShortId, TxHash};

    fn sample_broadcast() -> RelayMessage {
        RelayMessage::Broadcast(BroadcastMessage {
            network_num: NetworkNum::new(3),
            block_hash: BlockHash::new([0xAB; 32]),
            payload: vec![1, 2, 3, 4, 5],
        })
    }

    #[test]
    fn frame_prefix_matches_body_length() {
        let frame = encode(&sample_broadcast()).unwrap();
        let len = u32::from_be_bytes(frame[..4].try_into().unwrap()) as usize;
        assert_eq!(len, frame.len() - LENGTH_PREFIX_LEN);
        assert_eq!(frame[4], MessageType::Broadcast.tag());
    }

    #[test]
    fn framed_decode_reports_consumed_bytes() {
        let msg = RelayMessage::Txs(TxsMessage {
            txs: vec![TxDetails {
                short_id: ShortId::new(9),
                tx_hash: TxHash::new([9u8; 32]),
                contents: b"content9".to_vec(),
            }],
        });
        let mut stream = encode(&msg).unwrap();
        let first_len = stream.len();
        stream.extend(encode(&RelayMessage::Ack).unwrap());

        let (decoded, consumed) = decode_framed(&stream).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(consumed, first_len);

        let (second, _) = decode_framed(&stream[consumed..]).unwrap();
        assert_eq!(second, RelayMessage::Ack);
    }

    #[test]
    fn ack_is_a_single_tag_byte() {
        let frame = encode(&RelayMessage::Ack).unwrap();
        assert_eq!(frame, vec![0, 0, 0, 1, MessageType::Ack.tag()]);
    }

    #[test]
    fn unknown_tag_rejected() {
        let err = decode(&[0xEE, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownMessageType(0xEE)));
    }

    #[test]
    fn empty_body_rejected() {
        assert!(matches!(decode(&[]), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn ack_with_payload_rejected() {
        let err = decode(&[MessageType::Ack.tag(), 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let body = encode_body(&sample_broadcast()).unwrap();
        let err = decode(&body[..body.len() - 3]).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn short_prefix_is_truncated() {
        let err = decode_framed(&[0, 0]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Truncated {
                needed: 4,
                available: 2
            }
        ));
    }

    #[test]
    fn incomplete_body_is_truncated() {
        let frame = encode(&RelayMessage::GetTxs(GetTxsMessage {
            short_ids: vec![ShortId::new(1), ShortId::new(2)],
        }))
        .unwrap();
        let err = decode_framed(&frame[..frame.len() - 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }

    #[test]
    fn oversized_prefix_rejected() {
        let prefix = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes();
        assert!(matches!(
            body_len(prefix),
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }
}
