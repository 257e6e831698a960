use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("malformed compressed block: {0}")]
    Malformed(String),

    #[error("block header must be {expected} bytes, got {actual}")]
    HeaderLength { expected: usize, actual: usize },

    #[error("truncated wire message: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("wire message checksum mismatch")]
    ChecksumMismatch,

    #[error("unknown blockchain network: {0}")]
    UnknownNetwork(String),
}
