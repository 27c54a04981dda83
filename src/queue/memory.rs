use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::{
    AckError, AckToken, BatchEntry, BatchFailure, ConfigError, DequeueError, EnqueueError,
    QueueAdapter, QueueMessage, SQS_MAX_BATCH,
};
use crate::domain::LogEvent;

#[derive(Debug, Clone)]
pub struct MemoryQueueConfig {
    pub visibility_timeout: Duration,
    pub max_batch_size: usize,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            max_batch_size: SQS_MAX_BATCH,
        }
    }
}

#[derive(Debug)]
struct Lease {
    handle: String,
    visible_at: Instant,
}

#[derive(Debug)]
struct StoredMessage {
    id: String,
    body: String,
    lease: Option<Lease>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.lease.as_ref().is_none_or(|lease| lease.visible_at <= now)
    }
}

/// In-process queue with SQS delivery semantics: received messages stay
/// hidden for the visibility timeout and are only removed by `acknowledge`.
///
/// Clones share the same underlying queue.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    label: String,
    config: MemoryQueueConfig,
    messages: Arc<Mutex<VecDeque<StoredMessage>>>,
}

impl MemoryQueue {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_config(label, MemoryQueueConfig::default())
    }

    pub fn with_config(label: impl Into<String>, config: MemoryQueueConfig) -> Self {
        Self {
            label: label.into(),
            config,
            messages: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Enqueue an already-encoded body. Returns the message id.
    pub fn push_raw(&self, body: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        self.messages.lock().push_back(StoredMessage {
            id: id.clone(),
            body: body.into(),
            lease: None,
        });
        id
    }

    /// Messages still on the queue, visible or in flight.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    pub fn in_flight(&self) -> usize {
        let now = Instant::now();
        self.messages
            .lock()
            .iter()
            .filter(|message| !message.is_visible(now))
            .count()
    }

    fn lease_visible(&self, max: usize, visibility_timeout: Duration) -> Vec<QueueMessage> {
        let now = Instant::now();
        let mut messages = self.messages.lock();

        messages
            .iter_mut()
            .filter(|message| message.is_visible(now))
            .take(max)
            .map(|message| {
                let handle = Uuid::new_v4().to_string();
                message.lease = Some(Lease {
                    handle: handle.clone(),
                    visible_at: now + visibility_timeout,
                });
                QueueMessage {
                    message_id: message.id.clone(),
                    ack: AckToken::new(handle),
                    body: message.body.clone(),
                }
            })
            .collect()
    }
}

#[async_trait]
impl QueueAdapter for MemoryQueue {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn describe(&self) -> String {
        format!("memory {}", self.label)
    }

    fn check_config(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.config.max_batch_size
    }

    async fn enqueue_one(&self, event: &LogEvent) -> Result<(), EnqueueError> {
        self.push_raw(event.encode());
        Ok(())
    }

    async fn send_chunk(&self, chunk: &[BatchEntry]) -> Result<Vec<BatchFailure>, EnqueueError> {
        for entry in chunk {
            self.push_raw(entry.event.encode());
        }
        Ok(Vec::new())
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, DequeueError> {
        Ok(self.lease_visible(max, self.config.visibility_timeout))
    }

    async fn acknowledge(&self, ack: &AckToken) -> Result<(), AckError> {
        let mut messages = self.messages.lock();
        let position = messages.iter().position(|message| {
            message
                .lease
                .as_ref()
                .is_some_and(|lease| lease.handle == ack.as_str())
        });

        match position {
            Some(index) => {
                messages.remove(index);
                Ok(())
            }
            None => Err(AckError::UnknownHandle(ack.to_string())),
        }
    }

    async fn health_check(&self) -> Result<(), DequeueError> {
        // Zero visibility timeout: whatever gets leased is visible again at once.
        self.lease_visible(1, Duration::ZERO);
        Ok(())
    }
}
