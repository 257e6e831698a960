//! Pre-built [`tracing::Span`] constructors for gateway operations.
//!
//! Consistent span names and fields make it easy to follow one relay
//! connection or one block through interleaved logs.

use relaygate_types::BlockHash;
use tracing::{debug_span, info_span, Span};

/// Span covering the handling of a single inbound relay message.
pub fn relay_recv_span(peer: &str, msg_type: &str) -> Span {
    debug_span!("relay_recv", peer = %peer, msg_type = %msg_type)
}

/// Span covering decompression and recovery of one block.
pub fn block_recovery_span(block_hash: &BlockHash) -> Span {
    info_span!("block_recovery", block = %block_hash)
}

/// Span covering one pass of the expiry sweeper.
pub fn sweep_span() -> Span {
    debug_span!("recovery_sweep")
}
