//! The gateway: wires the shared services to the node and relay connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use relaygate_chain::BtcBlockCodec;
use relaygate_types::{Clock, SystemClock};

use crate::config::GatewayConfig;
use crate::connection::{
    connect_node, connect_relay, NodeChannel, RelayLink, OUTBOUND_CHANNEL_CAPACITY,
};
use crate::error::GatewayError;
use crate::metrics::GatewayMetrics;
use crate::services::NetworkServices;
use crate::shutdown::ShutdownController;
use crate::sweeper::spawn_recovery_sweeper;

/// Timeout for waiting on background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Gateway {
    config: GatewayConfig,
    services: NetworkServices,
    node_channel: Arc<NodeChannel>,
    node_rx: Option<mpsc::Receiver<Vec<u8>>>,
    shutdown: ShutdownController,
    relays: Vec<RelayLink>,
    tasks: Vec<JoinHandle<()>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a gateway that reads time from `clock`.
    pub fn with_clock(config: GatewayConfig, clock: Arc<dyn Clock>) -> Result<Self, GatewayError> {
        let magic = config.blockchain_magic()?;
        let metrics = Arc::new(GatewayMetrics::new()?);
        let (node_channel, node_rx) = NodeChannel::new(OUTBOUND_CHANNEL_CAPACITY);
        let node_channel = Arc::new(node_channel);

        let services = NetworkServices::from_config(
            &config,
            Arc::new(BtcBlockCodec::new(magic)),
            node_channel.clone(),
            clock,
            metrics,
        );

        if config.drop_schedule().is_some() {
            tracing::warn!("test mode dropping_txs is enabled; relay messages will be dropped");
        }

        Ok(Self {
            config,
            services,
            node_channel,
            node_rx: Some(node_rx),
            shutdown: ShutdownController::new(),
            relays: Vec::new(),
            tasks: Vec::new(),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn services(&self) -> &NetworkServices {
        &self.services
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        self.services.metrics.clone()
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Open the node link, every configured relay session and the sweeper.
    ///
    /// Connection failures are logged, not fatal: the gateway keeps serving
    /// whichever connections came up.
    pub async fn start(&mut self) -> Result<(), GatewayError> {
        let Some(node_rx) = self.node_rx.take() else {
            return Err(GatewayError::Config("gateway already started".to_string()));
        };

        let node_addr = self.config.blockchain_addr();
        match connect_node(&node_addr, &self.node_channel, node_rx, &self.shutdown).await {
            Ok(task) => self.tasks.push(task),
            Err(e) => {
                tracing::warn!(node = %node_addr, error = %e, "blockchain node unreachable, blocks will not be forwarded");
            }
        }

        let drop_schedule = self.config.drop_schedule();
        for addr in self.config.relay_peers.clone() {
            match connect_relay(&addr, self.services.clone(), drop_schedule, &self.shutdown).await {
                Ok(link) => self.relays.push(link),
                Err(e) => tracing::warn!(peer = %addr, error = %e, "relay connection failed"),
            }
        }

        self.tasks.push(spawn_recovery_sweeper(
            self.services.clone(),
            Duration::from_secs(self.config.recovery_sweep_interval_secs.max(1)),
            self.config.pending_block_max_age_secs,
            self.config.short_id_max_age_secs,
            self.shutdown.subscribe(),
        ));

        tracing::info!(
            network = %self.services.network_num,
            relays = self.relays.len(),
            "gateway started"
        );
        Ok(())
    }

    /// Signal every task to stop and wait for them.
    pub async fn stop(&mut self) -> Result<(), GatewayError> {
        self.shutdown.shutdown();

        let relays = std::mem::take(&mut self.relays);
        let tasks = std::mem::take(&mut self.tasks);
        let join_all = async move {
            for link in relays {
                let _ = link.session.await;
                let _ = link.writer.await;
            }
            for task in tasks {
                let _ = task.await;
            }
        };

        tokio::time::timeout(SHUTDOWN_TIMEOUT, join_all)
            .await
            .map_err(|_| GatewayError::ShutdownTimeout)?;
        tracing::info!("gateway stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_chain::btc::network::REGTEST_MAGIC;
    use relaygate_protocol::NodeSink;

    #[test]
    fn builds_from_default_config() {
        let gateway = Gateway::new(GatewayConfig::default()).unwrap();
        assert_eq!(gateway.services().recovery.pending_count(), 0);
        assert!(!gateway.services().node.is_active());
    }

    #[test]
    fn unknown_chain_network_rejected() {
        let config = GatewayConfig {
            blockchain_network: "nowhere".to_string(),
            ..GatewayConfig::default()
        };
        assert!(matches!(Gateway::new(config), Err(GatewayError::Chain(_))));
    }

    #[tokio::test]
    async fn starts_without_reachable_peers_and_stops() {
        let config = GatewayConfig {
            blockchain_network: "regtest".to_string(),
            // Port 1 on localhost refuses connections.
            blockchain_port: 1,
            relay_peers: vec!["127.0.0.1:1".to_string()],
            ..GatewayConfig::default()
        };
        let mut gateway = Gateway::new(config).unwrap();
        assert_eq!(gateway.config().blockchain_magic().unwrap(), REGTEST_MAGIC);

        gateway.start().await.unwrap();
        assert!(gateway.start().await.is_err());
        gateway.stop().await.unwrap();
    }
}
