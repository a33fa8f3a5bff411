//! Periodic collection scheduler
//!
//! Owns the timer that drives [`CollectorService::run_collection_sweep`].
//! Manual collections go through the collector directly and never wait on or
//! cancel a running sweep.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::collector::CollectorService;

/// Drives the collector on a fixed period
pub struct CollectionScheduler {
    collector: CollectorService,
    period: Duration,
}

/// Running scheduler; dropping it does not stop the task, call `stop`
pub struct SchedulerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl CollectionScheduler {
    /// Create a new CollectionScheduler
    pub fn new(collector: CollectorService, period: Duration) -> Self {
        Self { collector, period }
    }

    /// Spawn the timer task. The first sweep runs immediately.
    pub fn start(self) -> SchedulerHandle {
        self.start_with_token(CancellationToken::new())
    }

    /// Spawn the timer task, stopping when `token` is cancelled
    pub fn start_with_token(self, token: CancellationToken) -> SchedulerHandle {
        let task_token = token.clone();
        let task = tokio::spawn(async move {
            self.run(task_token).await;
        });
        SchedulerHandle { token, task }
    }

    async fn run(self, token: CancellationToken) {
        let mut ticker = interval(self.period);
        // A sweep longer than the period delays the next one instead of
        // triggering a burst
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = self.period.as_secs(), "Collection scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        result = self.collector.run_collection_sweep() => {
                            if let Err(e) = result {
                                error!(error = %e, "Collection sweep aborted");
                            }
                        }
                        _ = token.cancelled() => break,
                    }
                }
                _ = token.cancelled() => break,
            }
        }

        info!("Collection scheduler stopped");
    }
}

impl SchedulerHandle {
    /// Cancel the timer and wait for the task to finish
    pub async fn stop(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Collection scheduler task failed");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
