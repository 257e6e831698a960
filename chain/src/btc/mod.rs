//! Bitcoin-style chain codec.

pub mod compact_size;
pub mod compressed;
pub mod envelope;
pub mod network;

pub use compressed::{compress, BtcBlockCodec, CompressedBlock, CompressedTx, BLOCK_HEADER_LEN};
pub use envelope::{parse_envelope, wrap, Envelope};
pub use network::magic_for_network;
