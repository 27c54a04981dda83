mod common;

use async_trait::async_trait;
use common::{event, receive_response, selected, sqs_queue};
use rask_log_relay::persist::{JsonLinesPersister, MemoryPersister};
use rask_log_relay::queue::{
    AckError, AckToken, BatchEntry, BatchFailure, ConfigError, DequeueError, EnqueueError,
    MemoryQueue, QueueAdapter, QueueMessage,
};
use rask_log_relay::drain::{DrainError, drain_all};
use rask_log_relay::{LogEvent, RelayStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio_test::assert_ok;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// MemoryQueue that rejects a chosen batch entry and can fail deletes.
#[derive(Clone)]
struct FaultyQueue {
    inner: MemoryQueue,
    reject_id: Option<String>,
    failing_acks: Arc<AtomicUsize>,
}

impl FaultyQueue {
    fn new(inner: MemoryQueue) -> Self {
        Self {
            inner,
            reject_id: None,
            failing_acks: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl QueueAdapter for FaultyQueue {
    fn name(&self) -> &'static str {
        "faulty"
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn check_config(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    async fn enqueue_one(&self, event: &LogEvent) -> Result<(), EnqueueError> {
        self.inner.enqueue_one(event).await
    }

    async fn send_chunk(&self, chunk: &[BatchEntry]) -> Result<Vec<BatchFailure>, EnqueueError> {
        let (rejected, accepted): (Vec<BatchEntry>, Vec<BatchEntry>) = chunk
            .iter()
            .cloned()
            .partition(|entry| Some(&entry.id) == self.reject_id.as_ref());
        self.inner.send_chunk(&accepted).await?;
        Ok(rejected
            .into_iter()
            .map(|entry| BatchFailure {
                id: entry.id,
                reason: "rejected".to_string(),
            })
            .collect())
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, DequeueError> {
        self.inner.receive(max).await
    }

    async fn acknowledge(&self, ack: &AckToken) -> Result<(), AckError> {
        let remaining = self.failing_acks.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_acks.store(remaining - 1, Ordering::SeqCst);
            return Err(AckError::Transport("connection reset".to_string()));
        }
        self.inner.acknowledge(ack).await
    }

    async fn health_check(&self) -> Result<(), DequeueError> {
        self.inner.health_check().await
    }
}

#[tokio::test]
async fn test_written_events_are_drained_exactly() {
    let dir = TempDir::new().unwrap();
    let storage = JsonLinesPersister::open(dir.path().join("events.ndjson")).await.unwrap();
    let storage = Arc::new(storage);

    let queue = MemoryQueue::new("logs");
    let store = RelayStore::new(storage.clone(), selected(queue.clone()));

    let written: Vec<LogEvent> = (0..23).map(event).collect();
    let report = store.write(written.clone()).await.unwrap();
    assert_eq!(report.enqueued, 23);
    assert!(storage.read_events().await.unwrap().is_empty());

    let drained = assert_ok!(store.drain().await);
    assert_eq!(drained.persisted, 23);
    assert!(queue.is_empty());
    assert_eq!(storage.read_events().await.unwrap(), written);
}

#[tokio::test]
async fn test_second_drain_finds_nothing() {
    let queue = MemoryQueue::new("logs");
    let persister = MemoryPersister::new();
    let store = RelayStore::new(Arc::new(persister.clone()), selected(queue.clone()));

    store.write((0..5).map(event).collect()).await.unwrap();
    store.drain().await.unwrap();
    let calls = persister.calls();

    let again = assert_ok!(store.drain().await);
    assert!(again.is_empty());
    assert_eq!(again.rounds, 1);
    assert_eq!(persister.calls(), calls);
}

#[tokio::test]
async fn test_rejected_entry_is_stored_once_through_fallback() {
    let queue = MemoryQueue::new("logs");
    let faulty = FaultyQueue {
        reject_id: Some("1".to_string()),
        ..FaultyQueue::new(queue.clone())
    };
    let persister = MemoryPersister::new();
    let store = RelayStore::new(Arc::new(persister.clone()), selected(faulty));

    store.write(vec![event(0), event(1), event(2)]).await.unwrap();
    assert_eq!(persister.events(), vec![event(1)]);

    store.drain().await.unwrap();
    let mut stored: Vec<i64> = persister
        .events()
        .iter()
        .filter_map(|e| e.get("n").and_then(|n| n.as_i64()))
        .collect();
    stored.sort_unstable();
    assert_eq!(stored, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_unacknowledged_message_stays_queued() {
    let queue = MemoryQueue::new("logs");
    let faulty = FaultyQueue::new(queue.clone());
    faulty.failing_acks.store(1, Ordering::SeqCst);
    queue.push_raw(event(0).encode());
    queue.push_raw(event(1).encode());

    let persister = MemoryPersister::new();
    let report = assert_ok!(drain_all(&faulty, &persister, None).await);

    assert_eq!(report.unacknowledged, 1);
    assert_eq!(report.persisted, 1);
    assert_eq!(persister.events(), vec![event(1)]);
    assert_eq!(queue.in_flight(), 1);
}

#[tokio::test]
async fn test_corrupt_message_does_not_stop_the_drain() {
    let queue = MemoryQueue::new("logs");
    queue.push_raw(event(0).encode());
    queue.push_raw("[1, 2, 3]");
    queue.push_raw(event(2).encode());

    let persister = MemoryPersister::new();
    let report = drain_all(&queue, &persister, Some(2)).await.unwrap();

    assert_eq!(report.undecodable, 1);
    assert_eq!(report.persisted, 2);
    assert_eq!(persister.events(), vec![event(0), event(2)]);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_receive_failure_mid_round_persists_pulled_events_then_errors() {
    let server = MockServer::start().await;
    let bodies: Vec<String> = (0..10).map(|i| event(i).encode()).collect();

    Mock::given(method("POST"))
        .and(path("/do/sqs/ReceiveMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(receive_response(&bodies)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/do/sqs/ReceiveMessage"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/do/sqs/DeleteMessage"))
        .respond_with(ResponseTemplate::new(200))
        .expect(10)
        .mount(&server)
        .await;

    let persister = MemoryPersister::new();
    let result = drain_all(&sqs_queue(&server), &persister, Some(200)).await;

    assert_eq!(persister.events(), (0..10).map(event).collect::<Vec<_>>());
    match result {
        Err(DrainError::Dequeue(DequeueError::Rejected { status, .. })) => assert_eq!(status, 503),
        other => panic!("Expected the receive error, got {other:?}"),
    }
}
