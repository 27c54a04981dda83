use thiserror::Error;

use crate::persist::PersistError;
use crate::queue::{DequeueError, EnqueueError};

/// Top-level error type for the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("Enqueue error: {0}")]
    Enqueue(#[from] EnqueueError),

    #[error("Dequeue error: {0}")]
    Dequeue(#[from] DequeueError),

    #[error("No queue backend configured: {0}")]
    NotConfigured(String),
}
