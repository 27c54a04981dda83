use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use super::{PersistError, Persister};
use crate::domain::LogEvent;

/// Keeps persisted events in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryPersister {
    events: Arc<Mutex<Vec<LogEvent>>>,
    calls: Arc<Mutex<usize>>,
}

impl MemoryPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Number of `persist` calls seen so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Persister for MemoryPersister {
    async fn persist(&self, events: Vec<LogEvent>) -> Result<(), PersistError> {
        *self.calls.lock() += 1;
        self.events.lock().extend(events);
        Ok(())
    }
}
