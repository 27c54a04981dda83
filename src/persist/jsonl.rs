//! Append-only JSON lines store. Each persisted event becomes one line; a
//! batch is written with a single write followed by fsync so it is durable
//! once `persist` returns.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{PersistError, Persister};
use crate::domain::LogEvent;

#[derive(Debug)]
pub struct JsonLinesPersister {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesPersister {
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every event stored so far. Lines that do not decode are skipped.
    pub async fn read_events(&self) -> Result<Vec<LogEvent>, PersistError> {
        let content = fs::read_to_string(&self.path).await?;
        let mut events = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match LogEvent::decode(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    "Skipping unreadable line {} in {}: {e}",
                    index + 1,
                    self.path.display()
                ),
            }
        }
        Ok(events)
    }
}

#[async_trait]
impl Persister for JsonLinesPersister {
    async fn persist(&self, events: Vec<LogEvent>) -> Result<(), PersistError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut buffer = String::new();
        for event in &events {
            buffer.push_str(&event.encode());
            buffer.push('\n');
        }

        let mut file = self.file.lock().await;
        file.write_all(buffer.as_bytes()).await?;
        file.sync_all().await?;

        debug!("Persisted {} events to {}", events.len(), self.path.display());
        Ok(())
    }
}
