//! Fundamental types for the relay gateway.
//!
//! This crate defines the value types shared across every other crate in the
//! workspace: transaction and block hashes, relay short IDs, timestamps and
//! network identifiers.

pub mod block;
pub mod hash;
pub mod network;
pub mod short_id;
pub mod time;

pub use block::BlockHash;
pub use hash::TxHash;
pub use network::NetworkNum;
pub use short_id::ShortId;
pub use time::{Clock, SystemClock, Timestamp};
