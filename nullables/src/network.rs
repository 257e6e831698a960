//! Nullable connections: record traffic without sending it.

use relaygate_messages::{GetTxsMessage, RelayMessage};
use relaygate_protocol::{NodeSink, RelayOutbound};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A relay connection that records every message the gateway sends it.
pub struct NullRelay {
    sent_messages: Mutex<Vec<RelayMessage>>,
}

impl NullRelay {
    pub fn new() -> Self {
        Self {
            sent_messages: Mutex::new(Vec::new()),
        }
    }

    /// Get all sent messages (for assertions).
    pub fn sent(&self) -> Vec<RelayMessage> {
        self.sent_messages.lock().unwrap().clone()
    }

    /// Take and clear the recorded messages.
    pub fn take(&self) -> Vec<RelayMessage> {
        std::mem::take(&mut *self.sent_messages.lock().unwrap())
    }

    /// All `gettxs` requests sent so far.
    pub fn requests(&self) -> Vec<GetTxsMessage> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                RelayMessage::GetTxs(req) => Some(req),
                _ => None,
            })
            .collect()
    }
}

impl Default for NullRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayOutbound for NullRelay {
    fn send(&self, message: RelayMessage) {
        self.sent_messages.lock().unwrap().push(message);
    }
}

/// A local blockchain node connection that records forwarded bytes.
pub struct NullNodeSink {
    sent: Mutex<Vec<Vec<u8>>>,
    active: AtomicBool,
}

impl NullNodeSink {
    /// A sink whose node connection is up.
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            active: AtomicBool::new(true),
        }
    }

    /// A sink with no node connected.
    pub fn inactive() -> Self {
        let sink = Self::new();
        sink.set_active(false);
        sink
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Get all forwarded payloads (for assertions).
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Clear all state.
    pub fn reset(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Default for NullNodeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeSink for NullNodeSink {
    fn send_to_node(&self, bytes: Vec<u8>) {
        self.sent.lock().unwrap().push(bytes);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
