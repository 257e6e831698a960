//! Relay gateway core.
//!
//! The gateway sits between a blockchain node and a relay overlay network.
//! Relays send blocks compressed into short transaction IDs; the gateway:
//! - Keeps the short-ID index shared by every relay session
//! - Rebuilds full blocks and forwards them to the local node
//! - Parks blocks with unknown pieces and requests exactly what is missing
//! - Retries parked blocks as soon as the missing pieces arrive
//! - Expires parked blocks and stale index entries on a timer

pub mod block_recovery;
pub mod config;
pub mod connection;
pub mod dedup;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod lossy;
pub mod metrics;
pub mod relay_session;
pub mod services;
pub mod session;
pub mod shutdown;
pub mod sweeper;
pub mod tracing_spans;
pub mod tx_service;

pub use block_recovery::{BlockRecoveryService, PendingBlock, RecoveredBlock, RegisterOutcome};
pub use config::{GatewayConfig, TEST_MODE_DROPPING_TXS};
pub use connection::{
    connect_node, connect_relay, spawn_frame_writer, spawn_node_link, spawn_relay_read_loop,
    NodeChannel, RelayChannel, RelayLink,
};
pub use dedup::RecentBlocks;
pub use error::{GatewayError, RecoveryError, SessionError};
pub use gateway::Gateway;
pub use logging::{init_logging, LogFormat};
pub use lossy::{DropSchedule, LossyRelaySession};
pub use metrics::GatewayMetrics;
pub use relay_session::RelaySession;
pub use services::NetworkServices;
pub use session::{Handled, MessageHandler, SessionState};
pub use shutdown::ShutdownController;
pub use sweeper::{spawn_recovery_sweeper, sweep_once, SweepReport};
pub use tx_service::{AssignOutcome, TransactionService};
