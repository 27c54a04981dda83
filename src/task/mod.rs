//! Background triggering of the drain.
//!
//! [`PullTask::trigger`] hands one [`AsyncPullTask`] to the runtime and
//! returns at once; the task runs a full drain and retries it on failure.
//! [`PullScheduler`] fires the trigger on a fixed interval.

pub mod retry;

pub use retry::{RetryPolicy, RetryStrategy};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::drain::{DrainError, DrainReport};
use crate::relay::RelayStore;

/// One drain run with bounded retries.
#[derive(Debug)]
pub struct AsyncPullTask {
    store: Arc<RelayStore>,
    retry: RetryPolicy,
}

impl AsyncPullTask {
    pub fn new(store: Arc<RelayStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn execute(&self) -> Result<DrainReport, DrainError> {
        let mut attempt = 1;
        loop {
            match self.store.drain().await {
                Ok(report) => {
                    if attempt > 1 {
                        info!(attempt, "Drain succeeded after retry");
                    }
                    return Ok(report);
                }
                Err(e) if self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(attempt, ?delay, "Drain failed, retrying: {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempt, "Drain failed, giving up until the next trigger: {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PullTask {
    task: Arc<AsyncPullTask>,
}

impl PullTask {
    pub fn new(store: Arc<RelayStore>, retry: RetryPolicy) -> Self {
        Self {
            task: Arc::new(AsyncPullTask::new(store, retry)),
        }
    }

    /// Queue a drain run on the runtime.
    pub fn trigger(&self) -> JoinHandle<Result<DrainReport, DrainError>> {
        let task = Arc::clone(&self.task);
        tokio::spawn(async move { task.execute().await })
    }
}

/// Triggers a [`PullTask`] every `interval` until cancelled. A tick that
/// lands while the previous run is still going is skipped.
#[derive(Debug)]
pub struct PullScheduler {
    task: PullTask,
    interval: Duration,
    cancel: CancellationToken,
}

impl PullScheduler {
    pub fn new(task: PullTask, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            task,
            interval,
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until the token is cancelled, then wait for the in-flight drain.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut running: Option<JoinHandle<Result<DrainReport, DrainError>>> = None;

        info!(interval = ?self.interval, "Pull scheduler started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if running.as_ref().is_some_and(|handle| !handle.is_finished()) {
                        debug!("Previous drain still running, skipping tick");
                        continue;
                    }
                    running = Some(self.task.trigger());
                }
            }
        }

        if let Some(handle) = running {
            if let Err(e) = handle.await {
                error!("Drain task panicked: {e}");
            }
        }
        info!("Pull scheduler stopped");
    }
}
