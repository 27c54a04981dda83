//! Pull side of the relay: move queued events into the persistent store.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::persist::{PersistError, Persister};
use crate::queue::{DequeueError, QueueAdapter};

#[derive(Error, Debug)]
pub enum DrainError {
    #[error("Dequeue failed: {0}")]
    Dequeue(#[from] DequeueError),
    #[error("Persisting {count} drained events failed: {source}")]
    Persist {
        count: usize,
        #[source]
        source: PersistError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub rounds: usize,
    pub receive_calls: usize,
    pub persisted: usize,
    pub unacknowledged: usize,
    pub undecodable: usize,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.persisted == 0 && self.unacknowledged == 0 && self.undecodable == 0
    }
}

/// Repeated dequeue-then-persist rounds with a fixed per-round cap.
///
/// Holds no lock across rounds: two drains running at once only compete for
/// messages, and the backend's visibility timeout keeps them from receiving
/// the same one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainLoop {
    batch_cap: Option<usize>,
}

impl DrainLoop {
    pub fn new(batch_cap: Option<usize>) -> Self {
        Self { batch_cap }
    }

    pub fn batch_cap(&self) -> Option<usize> {
        self.batch_cap
    }

    pub async fn run(
        &self,
        adapter: &dyn QueueAdapter,
        persister: &dyn Persister,
    ) -> Result<DrainReport, DrainError> {
        drain_all(adapter, persister, self.batch_cap).await
    }
}

/// Drain `adapter` into `persister`.
///
/// Each round asks for `batch_cap` messages (the backend maximum when
/// `None`) and persists what decoded. The loop ends after the first round
/// that delivered fewer messages than asked for, so an empty queue costs one
/// round and no persist call.
///
/// Messages are deleted from the queue before they are persisted. If the
/// persister fails, the events of that round are gone from the queue; the
/// error is returned so the caller's retry bookkeeping sees it. The same
/// goes for a receive that fails part way through a round: what was already
/// deleted is persisted first, then the receive error is returned.
pub async fn drain_all(
    adapter: &dyn QueueAdapter,
    persister: &dyn Persister,
    batch_cap: Option<usize>,
) -> Result<DrainReport, DrainError> {
    let requested = batch_cap.unwrap_or_else(|| adapter.max_batch_size()).max(1);
    let mut report = DrainReport::default();

    loop {
        let mut batch = adapter.dequeue_batch(Some(requested)).await?;
        let interrupted = batch.error.take();
        report.rounds += 1;
        report.receive_calls += batch.receive_calls;
        report.unacknowledged += batch.unacknowledged;
        report.undecodable += batch.undecodable;

        let delivered = batch.delivered;
        let events = batch.into_events();
        let count = events.len();

        if count > 0 {
            if let Err(source) = persister.persist(events).await {
                error!(
                    backend = adapter.name(),
                    count, "Failed to persist drained events: {source}"
                );
                return Err(DrainError::Persist { count, source });
            }
            report.persisted += count;
        }

        debug!(
            backend = adapter.name(),
            round = report.rounds,
            delivered,
            persisted = count,
            "Drain round finished"
        );

        if let Some(e) = interrupted {
            error!(
                backend = adapter.name(),
                persisted = report.persisted,
                "Receive failed during drain: {e}"
            );
            return Err(DrainError::Dequeue(e));
        }

        if delivered < requested {
            break;
        }
    }

    if !report.is_empty() {
        info!(
            backend = adapter.name(),
            persisted = report.persisted,
            rounds = report.rounds,
            undecodable = report.undecodable,
            unacknowledged = report.unacknowledged,
            "Pulled log events from {}",
            adapter.describe()
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogEvent;
    use crate::persist::MockPersister;
    use crate::queue::MemoryQueue;

    #[tokio::test]
    async fn test_empty_queue_never_persists() {
        let queue = MemoryQueue::new("empty");
        let mut persister = MockPersister::new();
        persister.expect_persist().times(0);

        let report = drain_all(&queue, &persister, None).await.unwrap();
        assert_eq!(report.rounds, 1);
        assert_eq!(report.receive_calls, 1);
        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_full_rounds_continue_until_short_round() {
        let queue = MemoryQueue::new("q");
        for n in 0..25 {
            queue.push_raw(LogEvent::new().with("n", n).encode());
        }

        let mut persister = MockPersister::new();
        persister
            .expect_persist()
            .withf(|events| !events.is_empty())
            .times(3)
            .returning(|_| Ok(()));

        let report = drain_all(&queue, &persister, Some(10)).await.unwrap();
        assert_eq!(report.rounds, 3);
        assert_eq!(report.persisted, 25);
        // Last round: 5 messages, then an empty receive.
        assert_eq!(report.receive_calls, 4);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_persist_failure_is_returned() {
        let queue = MemoryQueue::new("q");
        queue.push_raw(LogEvent::new().with("n", 1).encode());

        let mut persister = MockPersister::new();
        persister.expect_persist().times(1).returning(|events| {
            Err(PersistError::Rejected {
                count: events.len(),
                reason: "disk full".to_string(),
            })
        });

        let err = drain_all(&queue, &persister, None).await.unwrap_err();
        assert!(matches!(err, DrainError::Persist { count: 1, .. }));
    }
}
