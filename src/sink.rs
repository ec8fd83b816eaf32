//! Destinations for collected usage records

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::core::UsageRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize usage record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives complete usage records
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn save(&self, record: &UsageRecord) -> Result<(), SinkError>;
}

/// Keeps records in memory
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<UsageRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl UsageSink for MemorySink {
    async fn save(&self, record: &UsageRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|e| SinkError::Unavailable(e.to_string()))?
            .push(record.clone());
        Ok(())
    }
}

/// Appends each record as one JSON document per line
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl UsageSink for JsonLinesSink {
    async fn save(&self, record: &UsageRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(&line).await.map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), subscriber_id = %record.subscriber_id, "Usage record written");
        Ok(())
    }
}
