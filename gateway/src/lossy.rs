//! Lossy relay session for exercising block recovery.
//!
//! Wraps any [`MessageHandler`] and silently discards every Nth `tx` and
//! every Mth `txs` message. Drops are counter based, so a given message
//! sequence always loses the same messages. Only enabled through the
//! `dropping_txs` test mode.

use std::sync::Arc;

use relaygate_messages::RelayMessage;

use crate::error::SessionError;
use crate::metrics::GatewayMetrics;
use crate::relay_session::RelaySession;
use crate::session::{Handled, MessageHandler, SessionState};

/// Which messages a [`LossyRelaySession`] drops. Zero disables a rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DropSchedule {
    pub tx_every: u32,
    pub txs_every: u32,
}

impl Default for DropSchedule {
    fn default() -> Self {
        Self {
            tx_every: 10,
            txs_every: 3,
        }
    }
}

pub struct LossyRelaySession<H = RelaySession> {
    inner: H,
    schedule: DropSchedule,
    tx_count: u32,
    txs_count: u32,
    dropped: u64,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl<H: MessageHandler> LossyRelaySession<H> {
    pub fn new(inner: H, schedule: DropSchedule) -> Self {
        tracing::warn!(
            peer = %inner.peer_id(),
            tx_every = schedule.tx_every,
            txs_every = schedule.txs_every,
            "test mode: relay session drops transaction messages"
        );
        Self {
            inner,
            schedule,
            tx_count: 0,
            txs_count: 0,
            dropped: 0,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    /// Messages dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn should_drop(count: &mut u32, every: u32) -> bool {
        if every == 0 {
            return false;
        }
        *count += 1;
        if *count % every == 0 {
            *count = 0;
            true
        } else {
            false
        }
    }

    fn drop_message(&mut self, message: &RelayMessage) -> Handled {
        self.dropped += 1;
        if let Some(metrics) = &self.metrics {
            metrics.test_mode_drops.inc();
        }
        tracing::debug!(
            peer = %self.inner.peer_id(),
            msg_type = %message.message_type(),
            "test mode: dropping message"
        );
        Handled::Dropped
    }
}

impl<H: MessageHandler> MessageHandler for LossyRelaySession<H> {
    fn handle(&mut self, message: RelayMessage) -> Result<Handled, SessionError> {
        // Only established sessions lose messages; the inner session still
        // owns every state error.
        if self.inner.state() != SessionState::Established {
            return self.inner.handle(message);
        }
        let discard = match &message {
            RelayMessage::Tx(_) => Self::should_drop(&mut self.tx_count, self.schedule.tx_every),
            RelayMessage::Txs(_) => {
                Self::should_drop(&mut self.txs_count, self.schedule.txs_every)
            }
            _ => false,
        };
        if discard {
            return Ok(self.drop_message(&message));
        }
        self.inner.handle(message)
    }

    fn state(&self) -> SessionState {
        self.inner.state()
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn peer_id(&self) -> &str {
        self.inner.peer_id()
    }
}
