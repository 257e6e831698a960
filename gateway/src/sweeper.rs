//! Periodic expiry of stale recovery and index state.
//!
//! Blocks whose missing transactions never arrive (the relay went away, or a
//! request was lost) would otherwise sit in the tracker forever, and short-ID
//! bindings the relay has long since reused would pile up in the index.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::services::NetworkServices;
use crate::tracing_spans::sweep_span;

/// What one sweep removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_blocks: usize,
    pub expired_transactions: usize,
}

/// Run one sweep at the services' current time.
pub fn sweep_once(
    services: &NetworkServices,
    pending_max_age_secs: u64,
    short_id_max_age_secs: u64,
) -> SweepReport {
    let _enter = sweep_span().entered();
    let now = services.clock.now();
    let report = SweepReport {
        expired_blocks: services.recovery.clear_expired(pending_max_age_secs, now),
        expired_transactions: services
            .transactions
            .expire_older_than(short_id_max_age_secs, now),
    };

    services
        .metrics
        .blocks_expired
        .inc_by(report.expired_blocks as u64);
    services.update_gauges();

    if report.expired_blocks > 0 {
        tracing::info!(
            count = report.expired_blocks,
            "discarded pending blocks that were never completed"
        );
    }
    if report.expired_transactions > 0 {
        tracing::debug!(count = report.expired_transactions, "expired stale transactions");
    }
    report
}

/// Spawn the background sweeper. Runs every `interval` until shutdown.
pub fn spawn_recovery_sweeper(
    services: NetworkServices,
    interval: Duration,
    pending_max_age_secs: u64,
    short_id_max_age_secs: u64,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // skip the immediate first tick
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!("recovery sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    sweep_once(&services, pending_max_age_secs, short_id_max_age_secs);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::GatewayConfig;
    use crate::metrics::GatewayMetrics;
    use crate::shutdown::ShutdownController;
    use relaygate_chain::btc::network::REGTEST_MAGIC;
    use relaygate_chain::BtcBlockCodec;
    use relaygate_messages::BroadcastMessage;
    use relaygate_nullables::{NullClock, NullNodeSink};
    use relaygate_types::{BlockHash, NetworkNum, ShortId, TxHash};

    fn services(clock: Arc<NullClock>) -> NetworkServices {
        NetworkServices::from_config(
            &GatewayConfig::default(),
            Arc::new(BtcBlockCodec::new(REGTEST_MAGIC)),
            Arc::new(NullNodeSink::new()),
            clock,
            Arc::new(GatewayMetrics::new().unwrap()),
        )
    }

    fn park(services: &NetworkServices, b: u8) {
        let block_hash = BlockHash::new([b; 32]);
        let msg = BroadcastMessage {
            network_num: NetworkNum::DEFAULT,
            block_hash,
            payload: Vec::new(),
        };
        services
            .recovery
            .register_incomplete(block_hash, msg, &[ShortId::new(b as u32)], &[])
            .unwrap();
    }

    #[test]
    fn sweep_discards_old_blocks_and_transactions() {
        let clock = Arc::new(NullClock::new(1_000));
        let services = services(clock.clone());
        park(&services, 1);
        services
            .transactions
            .assign_short_id(TxHash::new([1; 32]), ShortId::new(1));
        clock.advance(100);
        park(&services, 2);

        let report = sweep_once(&services, 60, 60);
        assert_eq!(
            report,
            SweepReport {
                expired_blocks: 1,
                expired_transactions: 1,
            }
        );
        assert_eq!(services.recovery.pending_count(), 1);
        assert_eq!(services.metrics.blocks_expired.get(), 1);
        assert_eq!(services.metrics.pending_blocks.get(), 1);
    }

    #[test]
    fn sweep_of_fresh_state_removes_nothing() {
        let clock = Arc::new(NullClock::new(1_000));
        let services = services(clock);
        park(&services, 1);
        assert_eq!(sweep_once(&services, 60, 60), SweepReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_interval_and_stops_on_shutdown() {
        let clock = Arc::new(NullClock::new(1_000));
        let services = services(clock.clone());
        park(&services, 1);
        clock.advance(120);

        let shutdown = ShutdownController::new();
        let handle = spawn_recovery_sweeper(
            services.clone(),
            Duration::from_secs(30),
            60,
            3_600,
            shutdown.subscribe(),
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(services.recovery.pending_count(), 0);

        shutdown.shutdown();
        handle.await.unwrap();
    }
}
