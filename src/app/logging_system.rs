use super::config::LogLevel;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Targets capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "h2", "rustls"];

pub fn build_filter(level: LogLevel) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let level = tracing::Level::from(level).to_string().to_lowercase();
    let mut directives = vec![level];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    EnvFilter::new(directives.join(","))
}

/// Install the global subscriber on stderr, leaving stdout to command
/// output. JSON when `RUST_LOG_FORMAT=json`, compact text otherwise.
pub fn setup_logging(level: LogLevel) {
    let use_json = std::env::var("RUST_LOG_FORMAT").is_ok_and(|v| v == "json");
    let filter = build_filter(level);

    let result = if use_json {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .with(filter)
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {e}");
    }
}
