use super::{AppConfigError, Config};
use crate::relay::{DIRECT_WRITER, RELAY_WRITER};
use tracing::warn;
use url::Url;

impl Config {
    pub fn validate(&self) -> Result<(), AppConfigError> {
        // An unset endpoint only leaves the queue unconfigured; a malformed
        // one is a mistake worth failing on.
        if let Some(endpoint) = &self.queue_endpoint {
            Url::parse(endpoint).map_err(|e| {
                AppConfigError::InvalidUrl(format!("Invalid queue endpoint URL '{endpoint}': {e}"))
            })?;
        }

        if self.drain_batch_cap == 0 {
            return Err(AppConfigError::InvalidConfig(
                "Drain batch cap must be greater than 0".to_string(),
            ));
        }

        if self.drain_interval_secs == 0 {
            return Err(AppConfigError::InvalidConfig(
                "Drain interval must be greater than 0".to_string(),
            ));
        }

        if self.drain_max_attempts == 0 {
            return Err(AppConfigError::InvalidConfig(
                "Drain max attempts must be greater than 0".to_string(),
            ));
        }

        for (name, millis) in [
            ("Connect", self.connect_timeout_ms),
            ("Schedule", self.schedule_timeout_ms),
            ("Request", self.request_timeout_ms),
        ] {
            if millis == 0 {
                return Err(AppConfigError::InvalidConfig(format!(
                    "{name} timeout must be greater than 0"
                )));
            }
        }

        for writer in &self.enabled_writers {
            if writer != DIRECT_WRITER && writer != RELAY_WRITER {
                warn!("Ignoring unknown log writer '{writer}'");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_malformed_endpoint_is_rejected() {
        let config = Config {
            queue_endpoint: Some("not a url".to_string()),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        let config = Config {
            drain_batch_cap: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            request_timeout_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
