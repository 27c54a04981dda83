//! Domain layer for rask-log-relay.
//!
//! Contains the canonical types shared across all modules:
//! - `LogEvent`: the opaque event record relayed through the queue
//! - `RelayError`: top-level error type

pub mod error;
pub mod log_event;

pub use error::RelayError;
pub use log_event::{DecodeError, LogEvent};
