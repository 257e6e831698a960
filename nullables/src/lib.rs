//! Nullable infrastructure for deterministic testing.
//!
//! The gateway core talks to the outside world only through a clock, a relay
//! connection and a local node connection. This crate provides test-friendly
//! implementations of all three that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod network;

pub use clock::NullClock;
pub use network::{NullNodeSink, NullRelay};
