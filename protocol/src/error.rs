use relaygate_types::NetworkNum;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("message too large: {size} > {max}")]
    MessageTooLarge { size: usize, max: usize },

    #[error("truncated frame: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unknown message type tag: {0}")]
    UnknownMessageType(u8),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("wrong network: expected {expected}, peer is on {actual}")]
    WrongNetwork {
        expected: NetworkNum,
        actual: NetworkNum,
    },

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
