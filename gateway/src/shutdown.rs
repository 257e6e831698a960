//! Stop signal shared by the gateway's background tasks.
//!
//! Relay read loops, frame writers, the node link and the recovery sweeper
//! each hold a receiver and `select!` on it next to their I/O.

use tokio::signal;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for the next shutdown. Subscribe before spawning the task.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Number of tasks currently listening.
    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Tell every listening task to stop. Returns how many were notified.
    pub fn shutdown(&self) -> usize {
        let notified = self.tx.send(()).unwrap_or(0);
        tracing::debug!(tasks = notified, "shutdown broadcast");
        notified
    }

    /// Block until the process gets SIGINT or SIGTERM, then shut down.
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            _ = signal::ctrl_c() => tracing::info!("SIGINT received"),
            _ = terminate() => tracing::info!("SIGTERM received"),
        }
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            // Without a handler only SIGINT can stop the gateway.
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_listener_is_notified() {
        let controller = ShutdownController::new();
        let mut reader = controller.subscribe();
        let mut sweeper = controller.clone().subscribe();
        assert_eq!(controller.listeners(), 2);

        assert_eq!(controller.shutdown(), 2);
        assert!(reader.recv().await.is_ok());
        assert!(sweeper.recv().await.is_ok());
    }

    #[test]
    fn shutdown_with_no_tasks_is_harmless() {
        let controller = ShutdownController::default();
        assert_eq!(controller.listeners(), 0);
        assert_eq!(controller.shutdown(), 0);
    }

    #[tokio::test]
    async fn dropped_receivers_stop_counting() {
        let controller = ShutdownController::new();
        let rx = controller.subscribe();
        drop(rx);
        assert_eq!(controller.listeners(), 0);
    }
}
