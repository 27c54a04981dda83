use super::{AppConfigError, LogLevel};
use crate::queue::AdapterConfig;
use crate::relay::{DEFAULT_DRAIN_BATCH, RELAY_WRITER, writers_conflict};
use crate::task::RetryPolicy;
use clap::{Args, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_STORAGE_PATH: &str = "/tmp/rask-log-relay/events.ndjson";

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Queue backend to use (tries every registered backend when unset)
    #[arg(long, env = "RELAY_QUEUE_TYPE")]
    pub queue_type: Option<String>,

    /// Queue name or URL
    #[arg(long, env = "RELAY_QUEUE_NAME")]
    pub queue_name: Option<String>,

    /// Queue proxy endpoint URL
    #[arg(long, env = "RELAY_QUEUE_ENDPOINT")]
    pub queue_endpoint: Option<String>,

    /// Credential sent to the queue endpoint as a bearer token
    #[arg(long, env = "RELAY_QUEUE_CREDENTIALS", hide_env_values = true)]
    #[serde(skip_serializing)]
    pub queue_credentials: Option<String>,

    /// Log writers enabled on this host, comma separated
    #[arg(
        long,
        env = "RELAY_ENABLED_WRITERS",
        value_delimiter = ',',
        default_value = "relay"
    )]
    pub enabled_writers: Vec<String>,

    /// File the drained events are appended to
    #[arg(long, env = "RELAY_STORAGE_PATH", default_value = DEFAULT_STORAGE_PATH)]
    pub storage_path: PathBuf,

    /// Events requested per drain round
    #[arg(long, env = "DRAIN_BATCH_CAP", default_value = "200")]
    pub drain_batch_cap: usize,

    /// Seconds between scheduled drains
    #[arg(long, env = "DRAIN_INTERVAL_SECS", default_value = "60")]
    pub drain_interval_secs: u64,

    /// Runs of a failing drain before it waits for the next trigger
    #[arg(long, env = "DRAIN_MAX_ATTEMPTS", default_value = "3")]
    pub drain_max_attempts: u32,

    /// Connection timeout in milliseconds
    #[arg(long, env = "RELAY_CONNECT_TIMEOUT_MS", default_value = "1000")]
    pub connect_timeout_ms: u64,

    /// Timeout for queue sends in milliseconds
    #[arg(long, env = "RELAY_SCHEDULE_TIMEOUT_MS", default_value = "3000")]
    pub schedule_timeout_ms: u64,

    /// Timeout for queue receives and deletes in milliseconds
    #[arg(long, env = "RELAY_REQUEST_TIMEOUT_MS", default_value = "5000")]
    pub request_timeout_ms: u64,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Configuration file path (optional)
    #[arg(long, env = "CONFIG_FILE")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_type: None,
            queue_name: None,
            queue_endpoint: None,
            queue_credentials: None,
            enabled_writers: vec![RELAY_WRITER.to_string()],
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            drain_batch_cap: DEFAULT_DRAIN_BATCH,
            drain_interval_secs: 60,
            drain_max_attempts: 3,
            connect_timeout_ms: 1000,
            schedule_timeout_ms: 3000,
            request_timeout_ms: 5000,
            log_level: LogLevel::Info,
            config_file: None,
        }
    }
}

#[derive(Parser)]
struct ConfigArgs {
    #[command(flatten)]
    config: Config,
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, AppConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        ConfigArgs::try_parse_from(args)?.config.resolve()
    }

    /// Replace with the config file when one is named, then normalize and
    /// validate.
    pub fn resolve(self) -> Result<Self, AppConfigError> {
        if let Some(path) = &self.config_file {
            return Self::from_file(path);
        }
        let mut config = self;
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, AppConfigError> {
        let mut config: Config = toml::from_str(content)?;
        config.post_process();
        config.validate()?;
        Ok(config)
    }

    /// Blank values count as unset; writer names are matched
    /// case-insensitively.
    pub fn post_process(&mut self) {
        for field in [
            &mut self.queue_type,
            &mut self.queue_name,
            &mut self.queue_endpoint,
            &mut self.queue_credentials,
        ] {
            if field.as_deref().is_some_and(|value| value.trim().is_empty()) {
                *field = None;
            } else if let Some(value) = field {
                *value = value.trim().to_string();
            }
        }

        self.enabled_writers = self
            .enabled_writers
            .iter()
            .map(|writer| writer.trim().to_lowercase())
            .filter(|writer| !writer.is_empty())
            .collect();
    }

    pub fn adapter_config(&self) -> AdapterConfig {
        AdapterConfig {
            queue_name: self.queue_name.clone(),
            endpoint: self.queue_endpoint.clone(),
            credentials: self.queue_credentials.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            schedule_timeout: Duration::from_millis(self.schedule_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    /// True when the direct writer is enabled next to the relay.
    pub fn writers_conflict(&self) -> bool {
        writers_conflict(&self.enabled_writers)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.drain_max_attempts,
            ..RetryPolicy::default()
        }
    }
}
