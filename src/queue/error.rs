use thiserror::Error;

use super::message::BatchFailure;

/// Why a candidate backend cannot be used. Raised only while building or
/// checking an adapter; an unconfigured adapter is never selected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{backend}: missing {field}")]
    MissingField {
        backend: &'static str,
        field: &'static str,
    },
    #[error("{backend}: invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        backend: &'static str,
        endpoint: String,
        reason: String,
    },
    #[error("unknown queue backend '{0}'")]
    UnknownBackend(String),
    #[error("{backend}: failed to build client: {reason}")]
    Client {
        backend: &'static str,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum EnqueueError {
    #[error("Queue backend unreachable: {0}")]
    Transport(String),
    #[error("Queue backend rejected {action}: {status} {body}")]
    Rejected {
        action: String,
        status: u16,
        body: String,
    },
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
    #[error("{} of the batch entries failed to enqueue", failed.len())]
    PartialBatch { failed: Vec<BatchFailure> },
}

impl EnqueueError {
    /// Correlation ids the backend reported as failed, when it reported any.
    pub fn failed_entries(&self) -> Option<&[BatchFailure]> {
        match self {
            EnqueueError::PartialBatch { failed } => Some(failed),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DequeueError {
    #[error("Queue backend unreachable: {0}")]
    Transport(String),
    #[error("Queue backend rejected {action}: {status} {body}")]
    Rejected {
        action: String,
        status: u16,
        body: String,
    },
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
    #[error("Queue backend not configured: {0}")]
    NotConfigured(#[from] ConfigError),
}

#[derive(Error, Debug)]
pub enum AckError {
    #[error("Queue backend unreachable: {0}")]
    Transport(String),
    #[error("Queue backend rejected {action}: {status} {body}")]
    Rejected {
        action: String,
        status: u16,
        body: String,
    },
    #[error("Unknown or expired receipt handle: {0}")]
    UnknownHandle(String),
}
