use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{AdapterConfig, AdapterFactory, ConfigError, QueueAdapter, QueueRegistry};

/// Reasons candidate backends were rejected, in the order they were tried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigErrorSet(Vec<ConfigError>);

impl ConfigErrorSet {
    pub fn push(&mut self, error: ConfigError) {
        self.0.push(error);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ConfigErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&reasons.join("; "))
    }
}

/// Outcome of one selection: the chosen adapter, if any, and why the others
/// were passed over. Built fresh by every call, never cached.
#[derive(Clone, Default)]
pub struct SelectorResult {
    pub adapter: Option<Arc<dyn QueueAdapter>>,
    pub selected: Option<String>,
    pub errors: ConfigErrorSet,
}

impl SelectorResult {
    pub fn none(errors: ConfigErrorSet) -> Self {
        Self {
            adapter: None,
            selected: None,
            errors,
        }
    }

    pub fn is_selected(&self) -> bool {
        self.adapter.is_some()
    }
}

impl fmt::Debug for SelectorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectorResult")
            .field("selected", &self.selected)
            .field("adapter", &self.adapter.as_ref().map(|adapter| adapter.describe()))
            .field("errors", &self.errors)
            .finish()
    }
}

/// Build each candidate in order and return the first configured one.
pub fn select_configured(
    candidates: &[(String, AdapterFactory)],
    config: &AdapterConfig,
) -> SelectorResult {
    let mut errors = ConfigErrorSet::default();

    for (name, factory) in candidates {
        let adapter = match factory(config) {
            Ok(adapter) => adapter,
            Err(e) => {
                debug!(backend = %name, "Queue backend could not be built: {e}");
                errors.push(e);
                continue;
            }
        };

        match adapter.check_config() {
            Ok(()) => {
                info!(backend = %name, "Selected queue backend: {}", adapter.describe());
                return SelectorResult {
                    adapter: Some(adapter),
                    selected: Some(name.clone()),
                    errors,
                };
            }
            Err(e) => {
                debug!(backend = %name, "Queue backend not configured: {e}");
                errors.push(e);
            }
        }
    }

    warn!("No queue backend configured, events will be written directly: {errors}");
    SelectorResult::none(errors)
}

impl QueueRegistry {
    /// Select a backend for `config`. With `queue_type` only that backend is
    /// considered; an unknown name is recorded as a configuration error.
    pub fn select(&self, queue_type: Option<&str>, config: &AdapterConfig) -> SelectorResult {
        match self.candidates(queue_type) {
            Ok(candidates) => select_configured(&candidates, config),
            Err(e) => {
                warn!("Queue backend selection failed: {e}");
                let mut errors = ConfigErrorSet::default();
                errors.push(e);
                SelectorResult::none(errors)
            }
        }
    }
}
