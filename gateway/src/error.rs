use relaygate_chain::ChainError;
use relaygate_messages::MessageType;
use relaygate_protocol::ProtocolError;
use relaygate_types::BlockHash;
use thiserror::Error;

/// Errors from the block recovery tracker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("block {0} registered as incomplete with nothing missing")]
    NothingMissing(BlockHash),

    #[error("pending block limit reached ({max})")]
    CapacityReached { max: usize },
}

/// Errors that end a relay session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,

    #[error("{0} message received before the handshake completed")]
    NotEstablished(MessageType),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("chain codec error: {0}")]
    Chain(#[from] ChainError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("connection to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("logging already initialised: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
