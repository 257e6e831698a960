//! Relay wire protocol: message framing, encoding/decoding, handshake,
//! versioning, and the connection handles the gateway core writes to.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod transport;
pub mod version;

pub use error::ProtocolError;
pub use transport::{NodeSink, RelayOutbound};
pub use version::PROTOCOL_VERSION;
