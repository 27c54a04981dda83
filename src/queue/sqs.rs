use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

use super::{
    AckError, AckToken, AdapterConfig, BatchEntry, BatchFailure, ConfigError, DequeueError,
    EnqueueError, QueueAdapter, QueueMessage,
};
use crate::domain::LogEvent;

const BACKEND: &str = "sqs";

/// Which side of the proxy handles a call: `schedule` accepts the request
/// and performs it in the background, `do` performs it before responding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slug {
    Schedule,
    Do,
}

impl Slug {
    fn as_str(self) -> &'static str {
        match self {
            Slug::Schedule => "schedule",
            Slug::Do => "do",
        }
    }
}

#[derive(Debug)]
enum WireError {
    NotConfigured(ConfigError),
    Transport(String),
    Rejected {
        action: String,
        status: u16,
        body: String,
    },
}

impl From<WireError> for EnqueueError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::NotConfigured(e) => EnqueueError::Transport(e.to_string()),
            WireError::Transport(msg) => EnqueueError::Transport(msg),
            WireError::Rejected {
                action,
                status,
                body,
            } => EnqueueError::Rejected {
                action,
                status,
                body,
            },
        }
    }
}

impl From<WireError> for DequeueError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::NotConfigured(e) => DequeueError::NotConfigured(e),
            WireError::Transport(msg) => DequeueError::Transport(msg),
            WireError::Rejected {
                action,
                status,
                body,
            } => DequeueError::Rejected {
                action,
                status,
                body,
            },
        }
    }
}

impl From<WireError> for AckError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::NotConfigured(e) => AckError::Transport(e.to_string()),
            WireError::Transport(msg) => AckError::Transport(msg),
            WireError::Rejected {
                action,
                status,
                body,
            } => AckError::Rejected {
                action,
                status,
                body,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReceiveResponse {
    #[serde(rename = "Messages", default)]
    messages: Option<Vec<ReceivedMessage>>,
}

#[derive(Debug, Deserialize)]
struct ReceivedMessage {
    #[serde(rename = "MessageId")]
    message_id: String,
    #[serde(rename = "ReceiptHandle")]
    receipt_handle: String,
    #[serde(rename = "Body")]
    body: String,
}

#[derive(Debug, Deserialize)]
struct SendBatchResponse {
    #[serde(rename = "Failed", default)]
    failed: Vec<FailedEntry>,
}

#[derive(Debug, Deserialize)]
struct FailedEntry {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Code", default)]
    code: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

/// SQS reached through an HTTP proxy that owns the AWS credentials.
///
/// Calls are `POST {endpoint}/{schedule|do}/sqs/{Action}` with the action's
/// parameters plus `QueueUrl` as a JSON body.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    config: AdapterConfig,
    client: Client,
}

impl SqsQueue {
    pub fn new(config: AdapterConfig) -> Result<Self, ConfigError> {
        let client = ClientBuilder::new()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("rask-log-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::Client {
                backend: BACKEND,
                reason: e.to_string(),
            })?;

        Ok(Self {
            config,
            client,
        })
    }

    pub fn queue_url(&self) -> Option<&str> {
        self.config.queue_name.as_deref().filter(|s| !s.is_empty())
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.config.endpoint.as_deref().filter(|s| !s.is_empty())
    }

    fn action_url(&self, slug: Slug, action: &str) -> Result<String, ConfigError> {
        let endpoint = self.endpoint().ok_or(ConfigError::MissingField {
            backend: BACKEND,
            field: "queue_endpoint",
        })?;
        Ok(format!(
            "{}/{}/sqs/{action}",
            endpoint.trim_end_matches('/'),
            slug.as_str()
        ))
    }

    async fn call(
        &self,
        slug: Slug,
        action: &str,
        mut params: Map<String, Value>,
    ) -> Result<Option<String>, WireError> {
        self.check_config().map_err(WireError::NotConfigured)?;
        let url = self.action_url(slug, action).map_err(WireError::NotConfigured)?;
        let queue_url = self.queue_url().unwrap_or_default().to_string();
        params.insert("QueueUrl".to_string(), Value::String(queue_url));

        let timeout = match slug {
            Slug::Schedule => self.config.schedule_timeout,
            Slug::Do => self.config.request_timeout,
        };

        let mut request = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&params)
            .timeout(timeout);
        if let Some(token) = &self.config.credentials {
            request = request.bearer_auth(token);
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return Err(WireError::Transport(format!("{} {action}: {e}", slug.as_str())));
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            WireError::Transport(format!("{} {action}: reading response: {e}", slug.as_str()))
        })?;
        let latency = start.elapsed();

        if status.as_u16() >= 300 {
            return Err(WireError::Rejected {
                action: format!("{} {action}", slug.as_str()),
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            action,
            slug = slug.as_str(),
            status = status.as_u16(),
            "SQS proxy call completed in {latency:?}"
        );

        if status == StatusCode::NO_CONTENT {
            Ok(None)
        } else {
            Ok(Some(body))
        }
    }
}

#[async_trait]
impl QueueAdapter for SqsQueue {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn describe(&self) -> String {
        format!("{BACKEND} {}", self.queue_url().unwrap_or_default())
    }

    fn check_config(&self) -> Result<(), ConfigError> {
        if self.queue_url().is_none() {
            return Err(ConfigError::MissingField {
                backend: BACKEND,
                field: "queue_name",
            });
        }
        let endpoint = self.endpoint().ok_or(ConfigError::MissingField {
            backend: BACKEND,
            field: "queue_endpoint",
        })?;
        Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            backend: BACKEND,
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    async fn enqueue_one(&self, event: &LogEvent) -> Result<(), EnqueueError> {
        let mut params = Map::new();
        params.insert("MessageBody".to_string(), Value::String(event.encode()));
        self.call(Slug::Schedule, "SendMessage", params).await?;
        Ok(())
    }

    async fn send_chunk(&self, chunk: &[BatchEntry]) -> Result<Vec<BatchFailure>, EnqueueError> {
        let entries: Vec<Value> = chunk
            .iter()
            .map(|entry| json!({ "Id": entry.id, "MessageBody": entry.event.encode() }))
            .collect();
        let mut params = Map::new();
        params.insert("Entries".to_string(), Value::Array(entries));

        let Some(body) = self.call(Slug::Schedule, "SendMessageBatch", params).await? else {
            return Ok(Vec::new());
        };
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        // The proxy accepted the call; a body we cannot read does not mean the
        // entries were lost, so it is not turned into a fallback.
        let response: SendBatchResponse = match serde_json::from_str(&body) {
            Ok(response) => response,
            Err(e) => {
                warn!("Unreadable SendMessageBatch response, assuming accepted: {e}");
                return Ok(Vec::new());
            }
        };

        Ok(response
            .failed
            .into_iter()
            .map(|entry| BatchFailure {
                reason: format!(
                    "{}: {}",
                    entry.code.unwrap_or_else(|| "Failed".to_string()),
                    entry.message.unwrap_or_default()
                ),
                id: entry.id,
            })
            .collect())
    }

    async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, DequeueError> {
        let mut params = Map::new();
        params.insert("MaxNumberOfMessages".to_string(), Value::from(max));

        let Some(body) = self.call(Slug::Do, "ReceiveMessage", params).await? else {
            return Ok(Vec::new());
        };
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let response: ReceiveResponse = serde_json::from_str(&body)
            .map_err(|e| DequeueError::InvalidResponse(format!("ReceiveMessage: {e}: {body}")))?;

        Ok(response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|message| QueueMessage {
                message_id: message.message_id,
                ack: AckToken::new(message.receipt_handle),
                body: message.body,
            })
            .collect())
    }

    async fn acknowledge(&self, ack: &AckToken) -> Result<(), AckError> {
        let mut params = Map::new();
        params.insert(
            "ReceiptHandle".to_string(),
            Value::String(ack.as_str().to_string()),
        );
        self.call(Slug::Do, "DeleteMessage", params).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DequeueError> {
        let mut params = Map::new();
        params.insert("MaxNumberOfMessages".to_string(), Value::from(1));
        params.insert("VisibilityTimeout".to_string(), Value::from(0));
        self.call(Slug::Do, "ReceiveMessage", params).await?;
        Ok(())
    }
}
