use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A queue message body could not be turned back into a [`LogEvent`].
#[derive(Error, Debug)]
#[error("Message decode error: {source} (body: {body})")]
pub struct DecodeError {
    pub body: String,
    #[source]
    pub source: serde_json::Error,
}

/// One log event as produced by the host's logging layer.
///
/// The relay treats the record as opaque: field names and values belong to
/// the logging layer, the relay only moves the record around. On the wire an
/// event is compact UTF-8 JSON with `/` and non-ASCII characters left
/// unescaped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogEvent(Map<String, Value>);

impl LogEvent {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self) -> String {
        // A map of JSON values always serializes.
        Value::Object(self.0.clone()).to_string()
    }

    pub fn decode(body: &str) -> Result<Self, DecodeError> {
        serde_json::from_str::<Map<String, Value>>(body)
            .map(Self)
            .map_err(|source| DecodeError {
                body: body.to_string(),
                source,
            })
    }

    /// The sample event used by the `test-queue` command.
    pub fn sample(created_at: i64) -> Self {
        Self::new()
            .with("eventname", "\\rask_log_relay\\event\\test")
            .with("component", "rask_log_relay")
            .with("action", "action")
            .with("target", "target")
            .with("objecttable", Value::Null)
            .with("objectid", Value::Null)
            .with("crud", "u")
            .with("edulevel", 2)
            .with("contextid", 159_003)
            .with("contextlevel", 70)
            .with("contextinstanceid", "396000")
            .with("userid", 0)
            .with("courseid", "155000")
            .with("relateduserid", Value::Null)
            .with("anonymous", 0)
            .with("other", "a:2:{s:6:\"sample\";i:5;s:2:\"xx\";i:10;}")
            .with("timecreated", created_at)
            .with("origin", "cli")
            .with("ip", Value::Null)
            .with("realuserid", Value::Null)
    }
}

impl From<Map<String, Value>> for LogEvent {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
