//! Status checks for the relay: is a queue selected and reachable, and is
//! the relay the only writer storing events.

mod round_trip;

pub use round_trip::{RoundTripReport, round_trip};

use serde::Serialize;
use tracing::debug;

use crate::relay::{RelayStore, writers_conflict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    fn ok(name: &'static str, summary: impl Into<String>, details: Option<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Ok,
            summary: summary.into(),
            details,
        }
    }

    fn error(name: &'static str, summary: impl Into<String>, details: Option<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Error,
            summary: summary.into(),
            details,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

/// Probe the selected queue. The probe does not change what the queue
/// delivers next.
pub async fn check_queue(store: &RelayStore) -> CheckResult {
    const NAME: &str = "queue";

    let Some(adapter) = store.queue() else {
        let reasons = store.selection().errors.to_string();
        return CheckResult::error(
            NAME,
            "Queue not configured",
            Some(format!(
                "Queue details are not configured properly, queueing will not be used: {reasons}"
            )),
        );
    };

    let description = adapter.describe();
    match adapter.health_check().await {
        Ok(()) => CheckResult::ok(NAME, format!("Queue details: {description}"), Some(description)),
        Err(e) => {
            debug!(backend = adapter.name(), "Queue health probe failed: {e}");
            CheckResult::error(NAME, "Queue not operational", Some(format!("{description}\n{e}")))
        }
    }
}

pub fn check_enabled<S: AsRef<str>>(enabled_writers: &[S]) -> CheckResult {
    const NAME: &str = "enabled";

    if writers_conflict(enabled_writers) {
        CheckResult::error(
            NAME,
            "Both the direct and the relay writer are enabled, every event is stored twice",
            None,
        )
    } else {
        CheckResult::ok(NAME, "Log writers enabled correctly", None)
    }
}

pub async fn run_checks<S: AsRef<str>>(
    store: &RelayStore,
    enabled_writers: &[S],
) -> Vec<CheckResult> {
    vec![check_queue(store).await, check_enabled(enabled_writers)]
}
