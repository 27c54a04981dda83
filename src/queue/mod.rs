//! Queue backends and backend selection.
//!
//! [`QueueAdapter`] is the capability every backend implements. Backends only
//! provide the wire primitives (`send_chunk`, `receive`, `acknowledge`); the
//! batching and dequeue algorithms are provided once, here, so every backend
//! shares the same partial-failure and acknowledgment semantics.

pub mod error;
pub mod memory;
pub mod message;
pub mod registry;
pub mod selector;
pub mod sqs;

pub use error::{AckError, ConfigError, DequeueError, EnqueueError};
pub use memory::MemoryQueue;
pub use message::{AckToken, BatchEntry, BatchFailure, Dequeued, DequeuedBatch, QueueMessage};
pub use registry::{AdapterConfig, AdapterFactory, QueueRegistry};
pub use selector::{ConfigErrorSet, SelectorResult, select_configured};
pub use sqs::SqsQueue;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::domain::LogEvent;

/// Largest batch SQS accepts for both SendMessageBatch and ReceiveMessage.
pub const SQS_MAX_BATCH: usize = 10;

#[async_trait]
pub trait QueueAdapter: Send + Sync {
    /// Registry key of the backend, e.g. `"sqs"`.
    fn name(&self) -> &'static str;

    /// Human-readable identity for diagnostics.
    fn describe(&self) -> String;

    fn check_config(&self) -> Result<(), ConfigError>;

    fn is_configured(&self) -> bool {
        self.check_config().is_ok()
    }

    fn max_batch_size(&self) -> usize {
        SQS_MAX_BATCH
    }

    async fn enqueue_one(&self, event: &LogEvent) -> Result<(), EnqueueError>;

    /// Sends at most `max_batch_size()` entries in one backend call and
    /// returns the entries the backend reported as failed.
    async fn send_chunk(&self, chunk: &[BatchEntry]) -> Result<Vec<BatchFailure>, EnqueueError>;

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, DequeueError>;

    async fn acknowledge(&self, ack: &AckToken) -> Result<(), AckError>;

    /// Probe the backend without changing what it will deliver next.
    async fn health_check(&self) -> Result<(), DequeueError>;

    /// Enqueue `entries` in backend-sized chunks.
    ///
    /// Per-item failures come back as [`EnqueueError::PartialBatch`] holding
    /// exactly the failed ids. A chunk whose call failed outright counts all
    /// of its entries as failed; when nothing at all reached the queue the
    /// underlying error is returned instead.
    async fn enqueue_batch(&self, entries: &[BatchEntry]) -> Result<(), EnqueueError> {
        let chunk_size = self.max_batch_size().max(1);
        let mut failed: Vec<BatchFailure> = Vec::new();
        let mut last_error = None;
        let mut any_sent = false;

        for chunk in entries.chunks(chunk_size) {
            match self.send_chunk(chunk).await {
                Ok(chunk_failures) => {
                    if chunk_failures.len() < chunk.len() {
                        any_sent = true;
                    }
                    failed.extend(chunk_failures);
                }
                Err(e) => {
                    warn!(
                        backend = self.name(),
                        entries = chunk.len(),
                        "Batch chunk failed to enqueue: {e}"
                    );
                    let reason = e.to_string();
                    failed.extend(chunk.iter().map(|entry| BatchFailure {
                        id: entry.id.clone(),
                        reason: reason.clone(),
                    }));
                    last_error = Some(e);
                }
            }
        }

        if failed.is_empty() {
            return Ok(());
        }
        if let (false, Some(e)) = (any_sent, last_error) {
            return Err(e);
        }
        Err(EnqueueError::PartialBatch { failed })
    }

    /// Receive, acknowledge and decode up to `max` messages.
    ///
    /// Each receive asks for `min(max, max_batch_size())` messages. The loop
    /// ends when a receive comes back empty or `max` messages have been
    /// delivered; `None` caps at one backend batch. A message is acknowledged
    /// before it counts as consumed: if the delete fails it is skipped and the
    /// backend redelivers it after the visibility timeout. A body that fails
    /// to decode after a successful delete cannot be recovered and is dropped.
    ///
    /// A receive error on the first call is returned as is. Later ones end
    /// the loop and are reported in [`DequeuedBatch::error`].
    async fn dequeue_batch(&self, max: Option<usize>) -> Result<DequeuedBatch, DequeueError> {
        let backend_max = self.max_batch_size().max(1);
        let cap = max.unwrap_or(backend_max).max(1);
        let per_call = cap.min(backend_max);
        let mut batch = DequeuedBatch::default();

        while batch.delivered < cap {
            let messages = match self.receive(per_call).await {
                Ok(messages) => messages,
                // Already-deleted messages must still reach the caller.
                Err(e) if batch.delivered > 0 => {
                    warn!(
                        backend = self.name(),
                        delivered = batch.delivered,
                        "Receive failed mid-batch, returning what was pulled: {e}"
                    );
                    batch.error = Some(e);
                    break;
                }
                Err(e) => return Err(e),
            };
            batch.receive_calls += 1;

            if messages.is_empty() {
                break;
            }

            for message in messages {
                batch.delivered += 1;

                if let Err(e) = self.acknowledge(&message.ack).await {
                    warn!(
                        backend = self.name(),
                        message_id = %message.message_id,
                        "Failed to delete message, leaving it for redelivery: {e}"
                    );
                    batch.unacknowledged += 1;
                    continue;
                }

                match LogEvent::decode(&message.body) {
                    Ok(event) => batch.entries.push(Dequeued {
                        message_id: message.message_id,
                        ack: message.ack,
                        event,
                    }),
                    Err(e) => {
                        error!(
                            backend = self.name(),
                            message_id = %message.message_id,
                            "Dropping undecodable message after delete: {e}"
                        );
                        batch.undecodable += 1;
                    }
                }
            }
        }

        debug!(
            backend = self.name(),
            pulled = batch.len(),
            delivered = batch.delivered,
            receive_calls = batch.receive_calls,
            "Dequeued batch"
        );
        Ok(batch)
    }
}
