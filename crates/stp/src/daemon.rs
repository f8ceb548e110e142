use std::sync::Arc;
use std::time::Duration;

use stp_pipeline::{BatchSummary, Orchestrator};
use tokio_util::sync::CancellationToken;

/// Polling daemon. Runs a batch on startup and then every poll interval until
/// cancelled. Batches run on the blocking pool since the gateways are synchronous.
///
/// A batch already in flight when cancellation arrives is allowed to finish, so
/// the message being processed still gets its write-back.
pub struct Daemon {
    orchestrator: Arc<Orchestrator>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl Daemon {
    pub fn new(orchestrator: Arc<Orchestrator>, poll_interval: Duration) -> Self {
        Self {
            orchestrator,
            poll_interval,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a CancellationToken that can be used to trigger shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled. Returns the number of batches executed.
    pub async fn run(&self) -> usize {
        tracing::info!(
            parsers = ?self.orchestrator.registry().names(),
            batch_size = self.orchestrator.batch_size(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "STP daemon starting"
        );

        let mut batches = 0;
        loop {
            run_batch(&self.orchestrator).await;
            batches += 1;

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(batches, "STP daemon shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        batches
    }
}

/// Execute one batch on the blocking pool. Errors are logged, never returned.
pub async fn run_batch(orchestrator: &Arc<Orchestrator>) -> Option<BatchSummary> {
    let orchestrator = Arc::clone(orchestrator);
    match tokio::task::spawn_blocking(move || orchestrator.process_pending_messages()).await {
        Ok(Ok(summary)) => Some(summary),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to fetch pending messages");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "Batch task panicked");
            None
        }
    }
}
