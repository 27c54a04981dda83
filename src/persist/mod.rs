//! The base persistence layer the relay writes through.
//!
//! `Persister` is the external collaborator both the push path (fallback) and
//! the drain path end in. It must be durable once `persist` returns.

pub mod jsonl;
pub mod memory;

pub use jsonl::JsonLinesPersister;
pub use memory::MemoryPersister;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::LogEvent;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage rejected {count} events: {reason}")]
    Rejected { count: usize, reason: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Persister: Send + Sync {
    async fn persist(&self, events: Vec<LogEvent>) -> Result<(), PersistError>;
}
