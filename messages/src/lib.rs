//! Relay protocol message types exchanged between the gateway and relays.

use relaygate_types::{BlockHash, NetworkNum, ShortId, TxHash};
use serde::{Deserialize, Serialize};
use std::fmt;

/// All message types in the relay protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Handshake
    Hello,
    Ack,

    // Block propagation
    Broadcast,

    // Transaction propagation
    TxAssign,
    Tx,
    Txs,
    GetTxs,
}

impl MessageType {
    /// Every type, in tag order.
    pub const ALL: [MessageType; 7] = [
        Self::Hello,
        Self::Ack,
        Self::Broadcast,
        Self::TxAssign,
        Self::Tx,
        Self::Txs,
        Self::GetTxs,
    ];

    /// One-byte tag written in front of each frame body.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Hello => 1,
            Self::Ack => 2,
            Self::Broadcast => 3,
            Self::TxAssign => 4,
            Self::Tx => 5,
            Self::Txs => 6,
            Self::GetTxs => 7,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Command name used in logs and spans.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Ack => "ack",
            Self::Broadcast => "broadcast",
            Self::TxAssign => "txassign",
            Self::Tx => "tx",
            Self::Txs => "txs",
            Self::GetTxs => "gettxs",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability exchange sent by both sides when a connection opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloMessage {
    pub protocol_version: u16,
    pub network_num: NetworkNum,
    /// Identifier of the sending node.
    pub node_id: u64,
}

/// A compressed block. `payload` is opaque to the relay layer and is
/// decompressed by the chain codec.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub network_num: NetworkNum,
    pub block_hash: BlockHash,
    pub payload: Vec<u8>,
}

/// Announces that the relay bound `short_id` to `tx_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxAssignMessage {
    pub network_num: NetworkNum,
    pub tx_hash: TxHash,
    pub short_id: ShortId,
}

/// A single transaction body, with the hash the sender claims for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMessage {
    pub network_num: NetworkNum,
    pub tx_hash: TxHash,
    pub contents: Vec<u8>,
}

/// One entry of a bulk transaction response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxDetails {
    pub short_id: ShortId,
    pub tx_hash: TxHash,
    pub contents: Vec<u8>,
}

/// Bulk transaction response, sent by the relay in answer to [`GetTxsMessage`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxsMessage {
    pub txs: Vec<TxDetails>,
}

/// Request for the transactions behind a set of short IDs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTxsMessage {
    pub short_ids: Vec<ShortId>,
}

/// Every message that can travel over a relay connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayMessage {
    Hello(HelloMessage),
    Ack,
    Broadcast(BroadcastMessage),
    TxAssign(TxAssignMessage),
    Tx(TxMessage),
    Txs(TxsMessage),
    GetTxs(GetTxsMessage),
}

impl RelayMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Hello(_) => MessageType::Hello,
            Self::Ack => MessageType::Ack,
            Self::Broadcast(_) => MessageType::Broadcast,
            Self::TxAssign(_) => MessageType::TxAssign,
            Self::Tx(_) => MessageType::Tx,
            Self::Txs(_) => MessageType::Txs,
            Self::GetTxs(_) => MessageType::GetTxs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_unique_and_reversible() {
        for ty in MessageType::ALL {
            assert_eq!(MessageType::from_tag(ty.tag()), Some(ty));
        }
        let mut tags: Vec<u8> = MessageType::ALL.iter().map(|t| t.tag()).collect();
        tags.dedup();
        assert_eq!(tags.len(), MessageType::ALL.len());
    }

    #[test]
    fn unknown_tag_is_none() {
        assert_eq!(MessageType::from_tag(0), None);
        assert_eq!(MessageType::from_tag(0xFF), None);
    }

    #[test]
    fn message_type_matches_variant() {
        let msg = RelayMessage::GetTxs(GetTxsMessage {
            short_ids: vec![ShortId::new(1)],
        });
        assert_eq!(msg.message_type(), MessageType::GetTxs);
        assert_eq!(RelayMessage::Ack.message_type().as_str(), "ack");
    }
}
