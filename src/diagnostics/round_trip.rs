use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::domain::{LogEvent, RelayError};
use crate::relay::RelayStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundTripReport {
    pub queue: String,
    pub push_latency_ms: f64,
    pub received: usize,
    pub mismatches: Vec<String>,
}

impl RoundTripReport {
    pub fn is_ok(&self) -> bool {
        self.received == 1 && self.mismatches.is_empty()
    }
}

/// Push the sample event through the selected queue and read it back.
///
/// Everything received is deleted from the queue, so events other than the
/// sample are handed to the store's persister instead of being lost.
pub async fn round_trip(store: &RelayStore, wait: Duration) -> Result<RoundTripReport, RelayError> {
    let adapter = store.queue().ok_or_else(|| {
        RelayError::NotConfigured(store.selection().errors.to_string())
    })?;

    let sample = LogEvent::sample(chrono::Utc::now().timestamp());

    let started = Instant::now();
    adapter.enqueue_one(&sample).await?;
    let push_latency = started.elapsed();
    info!(?push_latency, "Pushed sample event to {}", adapter.describe());

    tokio::time::sleep(wait).await;
    let events = adapter.dequeue_batch(None).await?.into_events();
    let received = events.len();

    let (matching, others): (Vec<LogEvent>, Vec<LogEvent>) = events
        .into_iter()
        .partition(|event| event.get("eventname") == sample.get("eventname"));

    if !others.is_empty() {
        warn!(count = others.len(), "Received unrelated events, persisting them");
        store.persister().persist(others).await?;
    }

    let mismatches = match matching.as_slice() {
        [event] => compare(&sample, event),
        _ => vec![format!("expected 1 sample event, received {}", matching.len())],
    };

    Ok(RoundTripReport {
        queue: adapter.describe(),
        push_latency_ms: push_latency.as_secs_f64() * 1000.0,
        received,
        mismatches,
    })
}

fn compare(expected: &LogEvent, actual: &LogEvent) -> Vec<String> {
    expected
        .fields()
        .iter()
        .filter_map(|(name, want)| match actual.get(name) {
            None => Some(format!("{name}: missing")),
            Some(got) if got != want => Some(format!("{name}: expected {want}, got {got}")),
            Some(_) => None,
        })
        .collect()
}
