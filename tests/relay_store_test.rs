mod common;

use common::{event, selected, sqs_queue};
use rask_log_relay::persist::MemoryPersister;
use rask_log_relay::queue::{AdapterConfig, QueueRegistry, SqsQueue};
use rask_log_relay::{LogEvent, RelayStore, SelectorResult, WriteReport};
use serde_json::json;
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn events(n: i64) -> Vec<LogEvent> {
    (0..n).map(event).collect()
}

#[tokio::test]
async fn test_no_backend_persists_directly_without_enqueue_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    // Endpoint set but no queue name: the only candidate is rejected.
    let config = AdapterConfig {
        endpoint: Some(server.uri()),
        ..Default::default()
    };
    let selection = QueueRegistry::with_defaults().select(None, &config);
    assert!(!selection.is_selected());

    let persister = MemoryPersister::new();
    let store = RelayStore::new(Arc::new(persister.clone()), selection);
    let report = store.write(events(3)).await.unwrap();

    assert_eq!(report, WriteReport { enqueued: 0, fallback: 3 });
    assert_eq!(persister.events(), events(3));
}

#[tokio::test]
async fn test_healthy_backend_takes_every_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/schedule/sqs/SendMessageBatch"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let persister = MemoryPersister::new();
    let store = RelayStore::new(Arc::new(persister.clone()), selected(sqs_queue(&server)));
    let report = store.write(events(3)).await.unwrap();

    assert_eq!(report, WriteReport { enqueued: 3, fallback: 0 });
    assert_eq!(persister.calls(), 0);
}

#[tokio::test]
async fn test_only_the_failed_entry_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/schedule/sqs/SendMessageBatch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Failed": [{ "Id": "1", "Code": "InternalError", "Message": "retry" }],
        })))
        .mount(&server)
        .await;

    let persister = MemoryPersister::new();
    let store = RelayStore::new(Arc::new(persister.clone()), selected(sqs_queue(&server)));
    let report = store.write(events(3)).await.unwrap();

    assert_eq!(report, WriteReport { enqueued: 2, fallback: 1 });
    assert_eq!(persister.events(), vec![event(1)]);
}

#[tokio::test]
async fn test_unreachable_backend_falls_back_in_full() {
    let sqs = SqsQueue::new(AdapterConfig {
        queue_name: Some(common::QUEUE_URL.to_string()),
        endpoint: Some("http://127.0.0.1:1".to_string()),
        ..Default::default()
    })
    .unwrap();

    let persister = MemoryPersister::new();
    let store = RelayStore::new(Arc::new(persister.clone()), selected(sqs));
    let report = store.write(events(12)).await.unwrap();

    assert_eq!(report, WriteReport { enqueued: 0, fallback: 12 });
    assert_eq!(persister.events(), events(12));
}

#[tokio::test]
async fn test_every_event_takes_exactly_one_path() {
    let server = MockServer::start().await;
    // First chunk of ten is accepted, the second chunk is rejected outright.
    Mock::given(method("POST"))
        .and(path("/schedule/sqs/SendMessageBatch"))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/schedule/sqs/SendMessageBatch"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let persister = MemoryPersister::new();
    let store = RelayStore::new(Arc::new(persister.clone()), selected(sqs_queue(&server)));
    let report = store.write(events(15)).await.unwrap();

    assert_eq!(report.total(), 15);
    assert_eq!(report.enqueued, 10);
    assert_eq!(persister.events(), (10..15).map(event).collect::<Vec<_>>());

    let stats = store.stats();
    assert_eq!(stats.enqueued, 10);
    assert_eq!(stats.fallback, 5);
}

#[test]
fn test_relaying_flag_follows_writer_conflict() {
    let store = RelayStore::new(Arc::new(MemoryPersister::new()), SelectorResult::default());
    assert!(store.is_relaying());
    assert!(!store.with_direct_writer_enabled(true).is_relaying());
}
