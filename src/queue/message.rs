use serde::{Deserialize, Serialize};

use super::error::DequeueError;
use crate::domain::LogEvent;

/// Opaque token required to acknowledge (delete) a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckToken(String);

impl AckToken {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AckToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as delivered by the backend, body still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub ack: AckToken,
    pub body: String,
}

/// One element of a batched enqueue, tagged with a caller-chosen id so
/// per-item failures can be mapped back to the source event.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub id: String,
    pub event: LogEvent,
}

impl BatchEntry {
    pub fn new(id: impl Into<String>, event: LogEvent) -> Self {
        Self {
            id: id.into(),
            event,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dequeued {
    pub message_id: String,
    pub ack: AckToken,
    pub event: LogEvent,
}

/// Outcome of one `dequeue_batch` call.
///
/// `delivered` counts every message the backend handed out, including the
/// ones that were skipped because acknowledgment or decoding failed.
/// `error` is set when a receive failed after earlier messages of the batch
/// were already deleted; `entries` still holds those messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DequeuedBatch {
    pub entries: Vec<Dequeued>,
    pub delivered: usize,
    pub unacknowledged: usize,
    pub undecodable: usize,
    pub receive_calls: usize,
    pub error: Option<DequeueError>,
}

impl DequeuedBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_events(self) -> Vec<LogEvent> {
        self.entries.into_iter().map(|entry| entry.event).collect()
    }
}
