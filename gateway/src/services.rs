//! Per-network shared state handed to every relay session.

use std::sync::Arc;

use parking_lot::Mutex;
use relaygate_chain::BlockCodec;
use relaygate_protocol::NodeSink;
use relaygate_types::{Clock, NetworkNum};

use crate::block_recovery::BlockRecoveryService;
use crate::config::GatewayConfig;
use crate::dedup::RecentBlocks;
use crate::metrics::GatewayMetrics;
use crate::tx_service::TransactionService;

/// Everything the sessions of one relay network share.
///
/// Cloning is cheap; every clone refers to the same index and tracker.
#[derive(Clone)]
pub struct NetworkServices {
    pub network_num: NetworkNum,
    /// Identifier this gateway announces in its hello.
    pub node_id: u64,
    pub transactions: Arc<TransactionService>,
    pub recovery: Arc<BlockRecoveryService>,
    pub recent_blocks: Arc<Mutex<RecentBlocks>>,
    pub codec: Arc<dyn BlockCodec>,
    pub node: Arc<dyn NodeSink>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<GatewayMetrics>,
}

impl NetworkServices {
    pub fn from_config(
        config: &GatewayConfig,
        codec: Arc<dyn BlockCodec>,
        node: Arc<dyn NodeSink>,
        clock: Arc<dyn Clock>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            network_num: config.network_num,
            node_id: config.node_id,
            transactions: Arc::new(TransactionService::new(clock.clone())),
            recovery: Arc::new(BlockRecoveryService::new(
                config.max_pending_blocks,
                clock.clone(),
            )),
            recent_blocks: Arc::new(Mutex::new(RecentBlocks::new(
                config.recent_block_capacity,
            ))),
            codec,
            node,
            clock,
            metrics,
        }
    }

    /// Refresh the gauges that mirror index and tracker sizes.
    pub fn update_gauges(&self) {
        self.metrics
            .pending_blocks
            .set(self.recovery.pending_count() as i64);
        self.metrics
            .known_short_ids
            .set(self.transactions.short_id_count() as i64);
    }
}
