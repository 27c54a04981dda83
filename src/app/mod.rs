pub mod config;
pub mod logging_system;

pub use config::{AppConfigError, Config, LogLevel};
pub use logging_system::setup_logging;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::diagnostics::{self, RoundTripReport};
use crate::domain::LogEvent;
use crate::drain::DrainReport;
use crate::persist::JsonLinesPersister;
use crate::queue::QueueRegistry;
use crate::relay::{RelayStore, WriteReport};
use crate::task::{AsyncPullTask, PullScheduler, PullTask};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Read NDJSON events from stdin and relay them to the queue
    Relay {
        /// Events handed to the queue per write
        #[arg(long, default_value = "200")]
        batch_size: usize,
    },
    /// Drain the queue into storage once
    Drain,
    /// Drain the queue on an interval until Ctrl+C
    Serve,
    /// Report queue and writer status as JSON
    Check,
    /// Push a sample event through the queue and read it back
    TestQueue {
        /// Seconds to wait between push and pull
        #[arg(long, default_value = "2")]
        wait_secs: u64,
    },
}

/// Totals of a `relay` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelaySummary {
    pub lines: usize,
    pub skipped: usize,
    pub enqueued: usize,
    pub fallback: usize,
}

impl RelaySummary {
    fn add(&mut self, report: WriteReport) {
        self.enqueued += report.enqueued;
        self.fallback += report.fallback;
    }
}

pub struct App {
    config: Config,
    store: Arc<RelayStore>,
}

impl App {
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let persister = JsonLinesPersister::open(&config.storage_path)
            .await
            .with_context(|| format!("opening {}", config.storage_path.display()))?;

        let selection = QueueRegistry::with_defaults()
            .select(config.queue_type.as_deref(), &config.adapter_config());

        if config.writers_conflict() {
            warn!("Both the direct and the relay writer are enabled, relayed events are redundant");
        }

        let store = RelayStore::new(Arc::new(persister), selection)
            .with_drain_cap(Some(config.drain_batch_cap))
            .with_direct_writer_enabled(config.writers_conflict());

        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn store(&self) -> &Arc<RelayStore> {
        &self.store
    }

    pub async fn run(&self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Relay { batch_size } => {
                let stdin = BufReader::new(tokio::io::stdin());
                let summary = self.relay_lines(stdin, batch_size.max(1)).await?;
                print_json(&summary)
            }
            Command::Drain => {
                let report = self.drain_once().await?;
                print_json(&report)
            }
            Command::Serve => self.serve().await,
            Command::Check => self.check().await,
            Command::TestQueue { wait_secs } => {
                self.test_queue(Duration::from_secs(wait_secs)).await
            }
        }
    }

    /// Relay NDJSON events from `reader` in batches of `batch_size`.
    pub async fn relay_lines<R>(&self, reader: R, batch_size: usize) -> anyhow::Result<RelaySummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut summary = RelaySummary::default();
        let mut batch = Vec::with_capacity(batch_size);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await.context("reading events")? {
            if line.trim().is_empty() {
                continue;
            }
            summary.lines += 1;

            match LogEvent::decode(&line) {
                Ok(event) => batch.push(event),
                Err(e) => {
                    warn!(line = summary.lines, "Skipping event that is not a JSON object: {e}");
                    summary.skipped += 1;
                    continue;
                }
            }

            if batch.len() >= batch_size {
                summary.add(self.store.write(std::mem::take(&mut batch)).await?);
            }
        }

        if !batch.is_empty() {
            summary.add(self.store.write(batch).await?);
        }

        info!(
            lines = summary.lines,
            enqueued = summary.enqueued,
            fallback = summary.fallback,
            "Relay finished"
        );
        Ok(summary)
    }

    pub async fn drain_once(&self) -> anyhow::Result<DrainReport> {
        let task = AsyncPullTask::new(Arc::clone(&self.store), self.config.retry_policy());
        Ok(task.execute().await?)
    }

    async fn serve(&self) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        let task = PullTask::new(Arc::clone(&self.store), self.config.retry_policy());
        let scheduler = PullScheduler::new(task, self.config.drain_interval(), cancel.clone());
        let scheduler = tokio::spawn(scheduler.run());

        info!("rask-log-relay is running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;
        info!("Shutdown requested");

        cancel.cancel();
        scheduler.await.context("scheduler task")?;
        Ok(())
    }

    async fn check(&self) -> anyhow::Result<()> {
        let results = diagnostics::run_checks(&self.store, &self.config.enabled_writers).await;
        print_json(&results)?;

        let failed = results.iter().filter(|result| !result.is_ok()).count();
        if failed > 0 {
            anyhow::bail!("{failed} check(s) failed");
        }
        Ok(())
    }

    async fn test_queue(&self, wait: Duration) -> anyhow::Result<()> {
        let report: RoundTripReport = diagnostics::round_trip(&self.store, wait).await?;
        print_json(&report)?;

        if !report.is_ok() {
            anyhow::bail!("queue round trip failed");
        }
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config.resolve()?;

    setup_logging(config.log_level);
    info!("Starting rask-log-relay v{}", crate::VERSION);

    let app = App::from_config(config).await?;
    app.run(cli.command).await
}
