//! Prometheus metrics for the gateway.
//!
//! [`GatewayMetrics`] owns a dedicated [`Registry`] so several gateways (or
//! tests) in one process never collide on metric names.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter,
    IntGauge, Opts, Registry, TextEncoder,
};

/// Central collection of gateway-level Prometheus metrics.
pub struct GatewayMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Broadcasts decompressed and forwarded on the first attempt.
    pub blocks_decompressed: IntCounter,
    /// Broadcasts that referenced unknown short IDs or bodies.
    pub blocks_incomplete: IntCounter,
    /// Pending blocks completed and forwarded after recovery.
    pub blocks_recovered: IntCounter,
    /// Pending blocks discarded by the sweeper.
    pub blocks_expired: IntCounter,
    /// Broadcasts skipped because the block was already forwarded.
    pub duplicate_blocks: IntCounter,
    /// Transaction bodies accepted from the relay.
    pub transactions_received: IntCounter,
    /// Transactions or blocks whose content did not match the claimed hash.
    pub hash_mismatches: IntCounter,
    /// Short IDs requested from the relay via `gettxs`.
    pub short_ids_requested: IntCounter,
    /// Messages dropped on purpose by the lossy test session.
    pub test_mode_drops: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Blocks currently waiting for missing transactions.
    pub pending_blocks: IntGauge,
    /// Short IDs currently bound in the index.
    pub known_short_ids: IntGauge,
    /// Relay connections currently open.
    pub relay_connections: IntGauge,
}

impl GatewayMetrics {
    /// Create a fresh set of metrics under a new [`Registry`].
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let blocks_decompressed = register_int_counter_with_registry!(
            Opts::new(
                "relaygate_blocks_decompressed_total",
                "Blocks decompressed on first attempt"
            ),
            registry
        )?;
        let blocks_incomplete = register_int_counter_with_registry!(
            Opts::new(
                "relaygate_blocks_incomplete_total",
                "Blocks first registered for recovery"
            ),
            registry
        )?;
        let blocks_recovered = register_int_counter_with_registry!(
            Opts::new(
                "relaygate_blocks_recovered_total",
                "Blocks forwarded after recovery"
            ),
            registry
        )?;
        let blocks_expired = register_int_counter_with_registry!(
            Opts::new(
                "relaygate_blocks_expired_total",
                "Pending blocks discarded after timing out"
            ),
            registry
        )?;
        let duplicate_blocks = register_int_counter_with_registry!(
            Opts::new(
                "relaygate_duplicate_blocks_total",
                "Broadcasts for blocks already forwarded"
            ),
            registry
        )?;
        let transactions_received = register_int_counter_with_registry!(
            Opts::new(
                "relaygate_transactions_received_total",
                "Transaction bodies received from the relay"
            ),
            registry
        )?;
        let hash_mismatches = register_int_counter_with_registry!(
            Opts::new(
                "relaygate_hash_mismatches_total",
                "Messages dropped because content did not match its hash"
            ),
            registry
        )?;
        let short_ids_requested = register_int_counter_with_registry!(
            Opts::new(
                "relaygate_short_ids_requested_total",
                "Short IDs requested from the relay"
            ),
            registry
        )?;
        let test_mode_drops = register_int_counter_with_registry!(
            Opts::new(
                "relaygate_test_mode_drops_total",
                "Messages dropped by the lossy test session"
            ),
            registry
        )?;

        let pending_blocks = register_int_gauge_with_registry!(
            Opts::new(
                "relaygate_pending_blocks",
                "Blocks waiting for missing transactions"
            ),
            registry
        )?;
        let known_short_ids = register_int_gauge_with_registry!(
            Opts::new("relaygate_known_short_ids", "Short IDs bound in the index"),
            registry
        )?;
        let relay_connections = register_int_gauge_with_registry!(
            Opts::new("relaygate_relay_connections", "Open relay connections"),
            registry
        )?;

        Ok(Self {
            registry,
            blocks_decompressed,
            blocks_incomplete,
            blocks_recovered,
            blocks_expired,
            duplicate_blocks,
            transactions_received,
            hash_mismatches,
            short_ids_requested,
            test_mode_drops,
            pending_blocks,
            known_short_ids,
            relay_connections,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_text_output() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.blocks_recovered.inc();
        metrics.pending_blocks.set(3);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("relaygate_blocks_recovered_total 1"));
        assert!(text.contains("relaygate_pending_blocks 3"));
    }

    #[test]
    fn separate_instances_do_not_collide() {
        let a = GatewayMetrics::new().unwrap();
        let b = GatewayMetrics::new().unwrap();
        a.duplicate_blocks.inc();
        assert_eq!(b.duplicate_blocks.get(), 0);
    }
}
