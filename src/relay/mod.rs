//! Push side of the relay.

pub mod stats;

pub use stats::{RelayStats, RelayStatsSnapshot};

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::LogEvent;
use crate::drain::{DrainError, DrainLoop, DrainReport};
use crate::persist::{PersistError, Persister};
use crate::queue::{BatchEntry, QueueAdapter, SelectorResult};

/// Writer name of the plain, non-queued store.
pub const DIRECT_WRITER: &str = "direct";
/// Writer name of this relay.
pub const RELAY_WRITER: &str = "relay";
/// Events requested per drain round unless configured otherwise.
pub const DEFAULT_DRAIN_BATCH: usize = 200;

/// True when both the direct writer and the relay are enabled, in which case
/// every event would be stored twice.
pub fn writers_conflict<S: AsRef<str>>(enabled_writers: &[S]) -> bool {
    let enabled = |name: &str| enabled_writers.iter().any(|w| w.as_ref() == name);
    enabled(DIRECT_WRITER) && enabled(RELAY_WRITER)
}

/// Where the events of one `write` call ended up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub enqueued: usize,
    pub fallback: usize,
}

impl WriteReport {
    pub fn total(&self) -> usize {
        self.enqueued + self.fallback
    }
}

/// Log writer that forwards events to the selected queue and persists
/// directly whatever the queue did not take.
pub struct RelayStore {
    persister: Arc<dyn Persister>,
    selection: SelectorResult,
    drain: DrainLoop,
    direct_writer_enabled: bool,
    stats: Arc<RelayStats>,
}

impl RelayStore {
    pub fn new(persister: Arc<dyn Persister>, selection: SelectorResult) -> Self {
        Self {
            persister,
            selection,
            drain: DrainLoop::new(Some(DEFAULT_DRAIN_BATCH)),
            direct_writer_enabled: false,
            stats: Arc::new(RelayStats::default()),
        }
    }

    #[must_use]
    pub fn with_drain_cap(mut self, batch_cap: Option<usize>) -> Self {
        self.drain = DrainLoop::new(batch_cap);
        self
    }

    /// Record that the direct writer is enabled next to this one.
    #[must_use]
    pub fn with_direct_writer_enabled(mut self, enabled: bool) -> Self {
        self.direct_writer_enabled = enabled;
        self
    }

    pub fn queue(&self) -> Option<&Arc<dyn QueueAdapter>> {
        self.selection.adapter.as_ref()
    }

    pub fn selection(&self) -> &SelectorResult {
        &self.selection
    }

    pub fn persister(&self) -> &Arc<dyn Persister> {
        &self.persister
    }

    /// Whether events written here are new data for readers. False when the
    /// direct writer is also enabled and already stores every event.
    pub fn is_relaying(&self) -> bool {
        !self.direct_writer_enabled
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Forward `events` to the queue. Entries the queue rejects, or all of
    /// them when the call fails or no queue is selected, are persisted
    /// directly. An event takes exactly one of the two paths.
    ///
    /// Queue failures never surface here; only a failing fallback persist
    /// does.
    pub async fn write(&self, events: Vec<LogEvent>) -> Result<WriteReport, PersistError> {
        let total = events.len();
        if total == 0 {
            return Ok(WriteReport::default());
        }

        let Some(adapter) = self.queue() else {
            debug!("No configured queue, writing {total} events directly");
            self.persist_fallback(events).await?;
            return Ok(WriteReport {
                enqueued: 0,
                fallback: total,
            });
        };

        let entries: Vec<BatchEntry> = events
            .into_iter()
            .enumerate()
            .map(|(index, event)| BatchEntry::new(index.to_string(), event))
            .collect();

        let fallback: Vec<LogEvent> = match adapter.enqueue_batch(&entries).await {
            Ok(()) => Vec::new(),
            Err(e) => match e.failed_entries() {
                Some(failed) => {
                    let failed_ids: HashSet<&str> = failed.iter().map(|f| f.id.as_str()).collect();
                    warn!(
                        backend = adapter.name(),
                        failed = failed_ids.len(),
                        total,
                        "Failed to push some events to the queue: {e}"
                    );
                    entries
                        .into_iter()
                        .filter(|entry| failed_ids.contains(entry.id.as_str()))
                        .map(|entry| entry.event)
                        .collect()
                }
                None => {
                    warn!(
                        backend = adapter.name(),
                        total, "Failed to push events to the queue: {e}"
                    );
                    entries.into_iter().map(|entry| entry.event).collect()
                }
            },
        };

        let report = WriteReport {
            enqueued: total - fallback.len(),
            fallback: fallback.len(),
        };
        self.stats.record_enqueued(report.enqueued);

        if !fallback.is_empty() {
            self.persist_fallback(fallback).await?;
        }

        debug!(
            enqueued = report.enqueued,
            fallback = report.fallback,
            "Relayed log events"
        );
        Ok(report)
    }

    /// Pull everything queued so far into the persister. Without a selected
    /// queue there is nothing to pull.
    pub async fn drain(&self) -> Result<DrainReport, DrainError> {
        let Some(adapter) = self.queue() else {
            debug!("No configured queue, nothing to drain");
            return Ok(DrainReport::default());
        };

        let report = self.drain.run(adapter.as_ref(), self.persister.as_ref()).await?;
        self.stats.record_drained(report.persisted, report.undecodable);
        Ok(report)
    }

    async fn persist_fallback(&self, events: Vec<LogEvent>) -> Result<(), PersistError> {
        let count = events.len();
        self.persister.persist(events).await?;
        self.stats.record_fallback(count);
        Ok(())
    }
}

impl std::fmt::Debug for RelayStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayStore")
            .field("selection", &self.selection)
            .field("drain", &self.drain)
            .field("direct_writer_enabled", &self.direct_writer_enabled)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MockPersister;
    use crate::queue::{ConfigErrorSet, MemoryQueue};

    fn selection(queue: &MemoryQueue) -> SelectorResult {
        SelectorResult {
            adapter: Some(Arc::new(queue.clone())),
            selected: Some("memory".to_string()),
            errors: ConfigErrorSet::default(),
        }
    }

    fn events(n: i64) -> Vec<LogEvent> {
        (0..n).map(|i| LogEvent::new().with("n", i)).collect()
    }

    #[tokio::test]
    async fn test_healthy_queue_takes_everything() {
        let queue = MemoryQueue::new("q");
        let mut persister = MockPersister::new();
        persister.expect_persist().times(0);

        let store = RelayStore::new(Arc::new(persister), selection(&queue));
        let report = store.write(events(3)).await.unwrap();

        assert_eq!(report, WriteReport { enqueued: 3, fallback: 0 });
        assert_eq!(queue.len(), 3);
        assert_eq!(store.stats().enqueued, 3);
    }

    #[tokio::test]
    async fn test_no_queue_writes_directly() {
        let mut persister = MockPersister::new();
        persister
            .expect_persist()
            .withf(|batch| batch.len() == 2)
            .times(1)
            .returning(|_| Ok(()));

        let store = RelayStore::new(Arc::new(persister), SelectorResult::default());
        let report = store.write(events(2)).await.unwrap();

        assert_eq!(report, WriteReport { enqueued: 0, fallback: 2 });
        assert_eq!(store.stats().fallback, 2);
    }

    #[tokio::test]
    async fn test_empty_write_is_a_no_op() {
        let mut persister = MockPersister::new();
        persister.expect_persist().times(0);

        let store = RelayStore::new(Arc::new(persister), SelectorResult::default());
        assert_eq!(store.write(Vec::new()).await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_drain_without_queue_is_a_no_op() {
        let mut persister = MockPersister::new();
        persister.expect_persist().times(0);

        let store = RelayStore::new(Arc::new(persister), SelectorResult::default());
        assert_eq!(store.drain().await.unwrap(), DrainReport::default());
    }

    #[test]
    fn test_is_relaying_unless_direct_writer_enabled() {
        let store = RelayStore::new(Arc::new(MockPersister::new()), SelectorResult::default());
        assert!(store.is_relaying());

        let store = store.with_direct_writer_enabled(true);
        assert!(!store.is_relaying());
    }

    #[test]
    fn test_writers_conflict() {
        assert!(writers_conflict(&["direct", "relay"]));
        assert!(!writers_conflict(&["relay"]));
        assert!(!writers_conflict(&["direct"]));
        assert!(!writers_conflict::<&str>(&[]));
    }
}
