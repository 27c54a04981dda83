use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{ConfigError, QueueAdapter, SqsQueue};

/// Snapshot of the queue settings handed to an adapter when it is built.
#[derive(Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Queue identifier (name or URL).
    pub queue_name: Option<String>,
    /// Proxy or endpoint override the adapter talks to.
    pub endpoint: Option<String>,
    /// Credential reference forwarded to the endpoint.
    pub credentials: Option<String>,
    pub connect_timeout: Duration,
    /// Budget for fire-and-forget sends.
    pub schedule_timeout: Duration,
    /// Budget for receive and delete calls.
    pub request_timeout: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            queue_name: None,
            endpoint: None,
            credentials: None,
            connect_timeout: Duration::from_secs(1),
            schedule_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl fmt::Debug for AdapterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterConfig")
            .field("queue_name", &self.queue_name)
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("schedule_timeout", &self.schedule_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

pub type AdapterFactory =
    Arc<dyn Fn(&AdapterConfig) -> Result<Arc<dyn QueueAdapter>, ConfigError> + Send + Sync>;

/// Named adapter factories in priority order.
#[derive(Clone, Default)]
pub struct QueueRegistry {
    entries: Vec<(String, AdapterFactory)>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every backend this crate ships: currently `sqs`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("sqs", |config| {
            let adapter: Arc<dyn QueueAdapter> = Arc::new(SqsQueue::new(config.clone())?);
            Ok(adapter)
        });
        registry
    }

    /// Adds a backend at the lowest priority. Registering an existing name
    /// replaces its factory and keeps its position.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&AdapterConfig) -> Result<Arc<dyn QueueAdapter>, ConfigError> + Send + Sync + 'static,
    {
        let name = name.into();
        let factory: AdapterFactory = Arc::new(factory);
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&AdapterFactory> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, factory)| factory)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Candidates for a selection: the named backend alone, or every
    /// registered backend in priority order when none is named.
    pub fn candidates(
        &self,
        queue_type: Option<&str>,
    ) -> Result<Vec<(String, AdapterFactory)>, ConfigError> {
        match queue_type {
            Some(name) => self
                .get(name)
                .map(|factory| vec![(name.to_string(), factory.clone())])
                .ok_or_else(|| ConfigError::UnknownBackend(name.to_string())),
            None => Ok(self.entries.clone()),
        }
    }
}

impl fmt::Debug for QueueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
