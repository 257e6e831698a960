//! Gateway configuration with TOML file support.

use serde::{Deserialize, Serialize};

use relaygate_chain::btc::magic_for_network;
use relaygate_types::NetworkNum;

use crate::lossy::DropSchedule;
use crate::GatewayError;

/// Test mode that wraps every relay session in a [`crate::LossyRelaySession`].
pub const TEST_MODE_DROPPING_TXS: &str = "dropping_txs";

/// Configuration for a relay gateway.
///
/// Can be loaded from a TOML file via [`GatewayConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Relay network this gateway belongs to.
    #[serde(default)]
    pub network_num: NetworkNum,

    /// Identifier sent to relays in the hello.
    #[serde(default = "default_node_id")]
    pub node_id: u64,

    /// Blockchain network name ("mainnet", "testnet", "regtest", "signet").
    #[serde(default = "default_blockchain_network")]
    pub blockchain_network: String,

    /// Overrides the message magic derived from `blockchain_network`.
    #[serde(default)]
    pub blockchain_net_magic: Option<u32>,

    /// Address of the local blockchain node.
    #[serde(default = "default_blockchain_ip")]
    pub blockchain_ip: String,

    #[serde(default = "default_blockchain_port")]
    pub blockchain_port: u16,

    /// Relay addresses ("ip:port") to connect to on startup.
    #[serde(default)]
    pub relay_peers: Vec<String>,

    /// Maximum number of blocks waiting for missing transactions.
    #[serde(default = "default_max_pending_blocks")]
    pub max_pending_blocks: usize,

    /// Seconds a block may wait for missing transactions before it is dropped.
    #[serde(default = "default_pending_block_max_age_secs")]
    pub pending_block_max_age_secs: u64,

    /// Seconds between recovery sweeps.
    #[serde(default = "default_recovery_sweep_interval_secs")]
    pub recovery_sweep_interval_secs: u64,

    /// Seconds an index entry lives without being touched.
    #[serde(default = "default_short_id_max_age_secs")]
    pub short_id_max_age_secs: u64,

    /// How many forwarded block hashes to remember for deduplication.
    #[serde(default = "default_recent_block_capacity")]
    pub recent_block_capacity: usize,

    /// Enabled test modes. Never set in production.
    #[serde(default)]
    pub test_modes: Vec<String>,

    /// In `dropping_txs` mode, drop every Nth `tx` message.
    #[serde(default = "default_tx_drop_every")]
    pub tx_drop_every: u32,

    /// In `dropping_txs` mode, drop every Nth `txs` message.
    #[serde(default = "default_txs_drop_every")]
    pub txs_drop_every: u32,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_node_id() -> u64 {
    1
}

fn default_blockchain_network() -> String {
    "mainnet".to_string()
}

fn default_blockchain_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_blockchain_port() -> u16 {
    8333
}

fn default_max_pending_blocks() -> usize {
    1_000
}

fn default_pending_block_max_age_secs() -> u64 {
    600
}

fn default_recovery_sweep_interval_secs() -> u64 {
    30
}

fn default_short_id_max_age_secs() -> u64 {
    3 * 24 * 60 * 60
}

fn default_recent_block_capacity() -> usize {
    crate::dedup::DEFAULT_RECENT_BLOCK_CAPACITY
}

fn default_tx_drop_every() -> u32 {
    DropSchedule::default().tx_every
}

fn default_txs_drop_every() -> u32 {
    DropSchedule::default().txs_every
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, GatewayError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| GatewayError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, GatewayError> {
        toml::from_str(s).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, GatewayError> {
        toml::to_string_pretty(self).map_err(|e| GatewayError::Config(e.to_string()))
    }

    /// Message magic for the local node connection.
    pub fn blockchain_magic(&self) -> Result<u32, GatewayError> {
        match self.blockchain_net_magic {
            Some(magic) => Ok(magic),
            None => Ok(magic_for_network(&self.blockchain_network)?),
        }
    }

    /// "ip:port" of the local blockchain node.
    pub fn blockchain_addr(&self) -> String {
        format!("{}:{}", self.blockchain_ip, self.blockchain_port)
    }

    pub fn has_test_mode(&self, mode: &str) -> bool {
        self.test_modes.iter().any(|m| m == mode)
    }

    /// Drop schedule for relay sessions, if the lossy test mode is on.
    pub fn drop_schedule(&self) -> Option<DropSchedule> {
        self.has_test_mode(TEST_MODE_DROPPING_TXS).then_some(DropSchedule {
            tx_every: self.tx_drop_every,
            txs_every: self.txs_drop_every,
        })
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network_num: NetworkNum::DEFAULT,
            node_id: default_node_id(),
            blockchain_network: default_blockchain_network(),
            blockchain_net_magic: None,
            blockchain_ip: default_blockchain_ip(),
            blockchain_port: default_blockchain_port(),
            relay_peers: Vec::new(),
            max_pending_blocks: default_max_pending_blocks(),
            pending_block_max_age_secs: default_pending_block_max_age_secs(),
            recovery_sweep_interval_secs: default_recovery_sweep_interval_secs(),
            short_id_max_age_secs: default_short_id_max_age_secs(),
            recent_block_capacity: default_recent_block_capacity(),
            test_modes: Vec::new(),
            tx_drop_every: default_tx_drop_every(),
            txs_drop_every: default_txs_drop_every(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
