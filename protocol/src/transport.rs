//! Connection handles the gateway core writes to.
//!
//! Neither handle reports delivery: the core hands bytes or messages over and
//! moves on. The socket tasks behind them own framing, I/O and reconnects.

use relaygate_messages::RelayMessage;

/// Outbound half of a relay connection.
pub trait RelayOutbound: Send + Sync {
    /// Queue a message for the relay.
    fn send(&self, message: RelayMessage);
}

/// Connection to the local blockchain node.
pub trait NodeSink: Send + Sync {
    /// Queue raw chain-wire bytes (a full block or a transaction) for the node.
    fn send_to_node(&self, bytes: Vec<u8>);

    /// Whether a local node connection is currently up.
    fn is_active(&self) -> bool;
}
