//! In-memory commit log

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{CommitLogError, CommitLogSource, StatusSink, fold_latest};
use crate::domain::{EntryId, LogEntry, LogEntryStatus};

/// Append-only commit log held in memory
#[derive(Default)]
pub struct InMemoryCommitLog {
    records: Mutex<Vec<LogEntry>>,
}

impl InMemoryCommitLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the log with entries
    pub fn with_entries(entries: impl IntoIterator<Item = LogEntry>) -> Self {
        Self {
            records: Mutex::new(entries.into_iter().collect()),
        }
    }

    pub async fn append(&self, entry: LogEntry) {
        debug!(id = %entry.id, status = %entry.status, "InMemoryCommitLog::append: called");
        self.records.lock().await.push(entry);
    }

    /// Latest record for a single id
    pub async fn get(&self, id: &EntryId) -> Option<LogEntry> {
        self.records.lock().await.iter().rev().find(|e| &e.id == id).cloned()
    }

    /// Number of raw records, including superseded ones
    pub async fn record_count(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl CommitLogSource for InMemoryCommitLog {
    async fn get_pending(&self) -> Result<Vec<LogEntry>, CommitLogError> {
        let records = self.records.lock().await.clone();
        Ok(fold_latest(records).into_iter().filter(|e| e.status.is_pending()).collect())
    }
}

#[async_trait]
impl StatusSink for InMemoryCommitLog {
    async fn set_status(
        &self,
        id: &EntryId,
        status: LogEntryStatus,
        error: Option<&str>,
    ) -> Result<(), CommitLogError> {
        debug!(%id, %status, "InMemoryCommitLog::set_status: called");
        let mut records = self.records.lock().await;
        let mut entry = records
            .iter()
            .rev()
            .find(|e| &e.id == id)
            .cloned()
            .ok_or_else(|| CommitLogError::NotFound(id.clone()))?;

        entry.set_status(status, error);
        records.push(entry);
        Ok(())
    }
}
