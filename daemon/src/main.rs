//! relaygate daemon: runs a relay gateway until interrupted.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use relaygate_gateway::{init_logging, Gateway, GatewayConfig, LogFormat, TEST_MODE_DROPPING_TXS};
use relaygate_types::NetworkNum;

#[derive(Parser)]
#[command(name = "relaygate-daemon", about = "Blockchain relay gateway daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "RELAYGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Relay network number this gateway serves.
    #[arg(long, env = "RELAYGATE_NETWORK_NUM")]
    network_num: Option<u32>,

    /// Identifier announced to relays in the hello.
    #[arg(long, env = "RELAYGATE_NODE_ID")]
    node_id: Option<u64>,

    /// Blockchain network of the local node: "mainnet", "testnet", "regtest" or "signet".
    #[arg(long, env = "RELAYGATE_BLOCKCHAIN_NETWORK")]
    blockchain_network: Option<String>,

    /// IP address of the local blockchain node.
    #[arg(long, env = "RELAYGATE_BLOCKCHAIN_IP")]
    blockchain_ip: Option<String>,

    /// Port of the local blockchain node.
    #[arg(long, env = "RELAYGATE_BLOCKCHAIN_PORT")]
    blockchain_port: Option<u16>,

    /// Relay addresses (comma-separated: "10.0.0.1:1809,10.0.0.2:1809").
    #[arg(long, env = "RELAYGATE_RELAY_PEERS", value_delimiter = ',')]
    relay_peers: Vec<String>,

    /// Maximum number of blocks awaiting missing transactions.
    #[arg(long, env = "RELAYGATE_MAX_PENDING_BLOCKS")]
    max_pending_blocks: Option<usize>,

    /// Drop relay transaction messages on purpose (recovery testing only).
    #[arg(long, env = "RELAYGATE_DROPPING_TXS")]
    dropping_txs: bool,

    /// Log format: "human" or "json".
    #[arg(long, env = "RELAYGATE_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "RELAYGATE_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Layer the CLI flags over `config`.
    fn apply(self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(n) = self.network_num {
            config.network_num = NetworkNum::new(n);
        }
        if let Some(node_id) = self.node_id {
            config.node_id = node_id;
        }
        if let Some(network) = self.blockchain_network {
            config.blockchain_network = network;
        }
        if let Some(ip) = self.blockchain_ip {
            config.blockchain_ip = ip;
        }
        if let Some(port) = self.blockchain_port {
            config.blockchain_port = port;
        }
        if !self.relay_peers.is_empty() {
            config.relay_peers = self.relay_peers;
        }
        if let Some(max) = self.max_pending_blocks {
            config.max_pending_blocks = max;
        }
        if self.dropping_txs && !config.has_test_mode(TEST_MODE_DROPPING_TXS) {
            config.test_modes.push(TEST_MODE_DROPPING_TXS.to_string());
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            GatewayConfig::from_toml_file(&path)
                .with_context(|| format!("loading config file {path}"))?
        }
        None => GatewayConfig::default(),
    };
    let config_path = cli.config.clone();
    let config = cli.apply(base);

    let log_format: LogFormat = config.log_format.parse()?;
    init_logging(log_format, &config.log_level)?;
    if let Some(path) = config_path {
        tracing::info!(path = %path.display(), "loaded config");
    }

    tracing::info!(
        network = %config.network_num,
        node = %config.blockchain_addr(),
        relays = config.relay_peers.len(),
        "starting relay gateway"
    );
    if !config.relay_peers.is_empty() {
        tracing::info!("relay peers: {}", config.relay_peers.join(", "));
    }

    let mut gateway = Gateway::new(config)?;
    gateway.start().await?;

    gateway.shutdown_controller().wait_for_signal().await;
    tracing::info!("shutdown signal received, stopping gateway");
    gateway.stop().await?;

    tracing::info!("relaygate daemon exited cleanly");
    Ok(())
}
