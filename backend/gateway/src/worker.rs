//! Background side of the webhook flow.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use toolcast_core::Component;
use toolcast_tasks::{AsyncJobs, ExternalCallback};

/// Drains queued provider callbacks into the task store.
pub struct ReconciliationWorker {
    jobs: AsyncJobs,
}

impl ReconciliationWorker {
    pub fn new(jobs: AsyncJobs) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Component for ReconciliationWorker {
    type Input = ExternalCallback;

    fn name(&self) -> &str {
        "reconciliation-worker"
    }

    async fn start(&self, mut rx: mpsc::Receiver<ExternalCallback>) -> Result<()> {
        info!("Reconciliation worker started");
        while let Some(callback) = rx.recv().await {
            let external_id = callback.external_id.clone();
            match self.jobs.on_external_callback(callback).await {
                Ok(true) => debug!(external_id = %external_id, "Callback applied"),
                Ok(false) => {}
                Err(e) => warn!(external_id = %external_id, error = %format!("{e:#}"), "Callback failed"),
            }
        }
        info!("Reconciliation worker stopped");
        Ok(())
    }
}

/// Periodically time out jobs whose provider never called back and drop old
/// finished tasks.
pub fn spawn_sweeper(
    jobs: AsyncJobs,
    every: Duration,
    task_retention: chrono::Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let expired = jobs.expire_stale().await;
                    let finished = jobs.tasks().sweep_completed(task_retention).await;
                    if expired + finished > 0 {
                        info!(expired, finished, "Sweep complete");
                    }
                }
            }
        }
        debug!("Sweeper stopped");
    })
}
