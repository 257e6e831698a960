//! Relay session lifecycle and the handler seam the connection task drives.

use std::fmt;

use relaygate_messages::RelayMessage;

use crate::error::SessionError;

/// Lifecycle of one relay connection.
///
/// `Connecting → Handshaking → Established → Closed`. A session only ever
/// moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    /// Our hello is out, waiting for the relay's ack.
    Handshaking,
    Established,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Established => "established",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal outcome of handling one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handled {
    Processed,
    /// The message was discarded (integrity failure, duplicate, test drop).
    Dropped,
}

/// Per-connection message handler.
///
/// Messages of one connection are fed to `handle` strictly in arrival order.
/// An `Err` is fatal: the session is closed and the connection torn down.
pub trait MessageHandler: Send {
    fn handle(&mut self, message: RelayMessage) -> Result<Handled, SessionError>;

    fn state(&self) -> SessionState;

    /// Move to `Closed`. Shared index and tracker state is left untouched.
    fn close(&mut self);

    fn peer_id(&self) -> &str;
}
