#![allow(dead_code)]

use rask_log_relay::queue::{AdapterConfig, ConfigErrorSet, QueueAdapter, SelectorResult, SqsQueue};
use rask_log_relay::LogEvent;
use serde_json::{Value, json};
use std::sync::Arc;
use wiremock::MockServer;

pub const QUEUE_URL: &str = "https://sqs.ap-southeast-2.amazonaws.com/123456789012/logs";

pub fn sqs_config(server: &MockServer) -> AdapterConfig {
    AdapterConfig {
        queue_name: Some(QUEUE_URL.to_string()),
        endpoint: Some(server.uri()),
        ..Default::default()
    }
}

pub fn sqs_queue(server: &MockServer) -> SqsQueue {
    SqsQueue::new(sqs_config(server)).unwrap()
}

pub fn selected(adapter: impl QueueAdapter + 'static) -> SelectorResult {
    SelectorResult {
        selected: Some(adapter.name().to_string()),
        adapter: Some(Arc::new(adapter)),
        errors: ConfigErrorSet::default(),
    }
}

pub fn event(n: i64) -> LogEvent {
    LogEvent::new()
        .with("eventname", "\\core\\event\\course_viewed")
        .with("n", n)
}

/// A ReceiveMessage response holding `bodies`, with receipt handles `h0`,
/// `h1`, ...
pub fn receive_response(bodies: &[String]) -> Value {
    let messages: Vec<Value> = bodies
        .iter()
        .enumerate()
        .map(|(i, body)| {
            json!({
                "MessageId": format!("m{i}"),
                "ReceiptHandle": format!("h{i}"),
                "Body": body,
            })
        })
        .collect();
    json!({ "Messages": messages })
}
