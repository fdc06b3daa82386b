//! Append-only JSONL commit log
//!
//! Every line is a full `LogEntry` record. Status transitions append a new
//! record for the same id; readers fold the file so the latest record wins.
//!
//! Writers in different processes (the daemon and the CLI) serialize through
//! an exclusive lock on a sibling `<file>.lock`, so compaction never drops a
//! record appended while it was rewriting the file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs2::FileExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::{CommitLogError, CommitLogSource, StatusSink, fold_latest};
use crate::domain::{EntryId, LogEntry, LogEntryStatus};

/// Commit log stored as a JSONL file
pub struct JsonlCommitLog {
    path: PathBuf,

    /// Serializes appends and compaction within this process
    write_lock: Mutex<()>,
}

/// Exclusive advisory lock on the commit log's lock file
///
/// Released when dropped.
struct FileLock {
    file: std::fs::File,
}

impl FileLock {
    async fn acquire(path: PathBuf) -> Result<Self, CommitLogError> {
        debug!(?path, "FileLock::acquire: called");
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(error = %e, "Failed to unlock commit log");
        }
    }
}

impl JsonlCommitLog {
    /// Create a commit log backed by `path` (created on first append)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        debug!(?path, "JsonlCommitLog::new: called");
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Take the in-process and cross-process write locks
    async fn lock(&self) -> Result<(MutexGuard<'_, ()>, FileLock), CommitLogError> {
        let guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file_lock = FileLock::acquire(self.lock_path()).await?;
        Ok((guard, file_lock))
    }

    /// Read every record in file order, skipping malformed lines
    async fn read_records(&self) -> Result<Vec<LogEntry>, CommitLogError> {
        debug!(path = ?self.path, "JsonlCommitLog::read_records: called");
        if !fs::try_exists(&self.path).await? {
            debug!("JsonlCommitLog::read_records: file does not exist");
            return Ok(vec![]);
        }

        let content = fs::read_to_string(&self.path).await?;
        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = ?self.path, line = lineno + 1, error = %e, "Skipping malformed commit log record");
                }
            }
        }

        debug!(count = records.len(), "JsonlCommitLog::read_records: returning records");
        Ok(records)
    }

    /// Latest record for every id
    pub async fn get_all(&self) -> Result<Vec<LogEntry>, CommitLogError> {
        debug!("JsonlCommitLog::get_all: called");
        Ok(fold_latest(self.read_records().await?))
    }

    /// Latest record for a single id
    pub async fn get(&self, id: &EntryId) -> Result<Option<LogEntry>, CommitLogError> {
        debug!(%id, "JsonlCommitLog::get: called");
        let found = self.read_records().await?.into_iter().rev().find(|e| &e.id == id);
        Ok(found)
    }

    /// Append a record
    pub async fn append(&self, entry: &LogEntry) -> Result<(), CommitLogError> {
        debug!(id = %entry.id, status = %entry.status, "JsonlCommitLog::append: called");
        let _locks = self.lock().await?;
        self.append_locked(entry).await
    }

    async fn append_locked(&self, entry: &LogEntry) -> Result<(), CommitLogError> {
        let line = serde_json::to_string(entry)? + "\n";
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!("JsonlCommitLog::append: record written");
        Ok(())
    }

    /// Rewrite the file keeping only the latest record per id
    ///
    /// Returns the number of records dropped.
    pub async fn compact(&self) -> Result<usize, CommitLogError> {
        debug!(path = ?self.path, "JsonlCommitLog::compact: called");
        let _locks = self.lock().await?;

        let records = self.read_records().await?;
        let original = records.len();
        let latest = fold_latest(records);
        let dropped = original - latest.len();

        if dropped == 0 {
            debug!("JsonlCommitLog::compact: nothing to drop");
            return Ok(0);
        }

        let mut content = String::new();
        for entry in &latest {
            content.push_str(&serde_json::to_string(entry)?);
            content.push('\n');
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(dropped, kept = latest.len(), "JsonlCommitLog::compact: rewrote file");
        Ok(dropped)
    }
}

#[async_trait]
impl CommitLogSource for JsonlCommitLog {
    async fn get_pending(&self) -> Result<Vec<LogEntry>, CommitLogError> {
        debug!("JsonlCommitLog::get_pending: called");
        let pending: Vec<LogEntry> = self
            .get_all()
            .await?
            .into_iter()
            .filter(|e| e.status.is_pending())
            .collect();
        debug!(count = pending.len(), "JsonlCommitLog::get_pending: returning entries");
        Ok(pending)
    }
}

#[async_trait]
impl StatusSink for JsonlCommitLog {
    async fn set_status(
        &self,
        id: &EntryId,
        status: LogEntryStatus,
        error: Option<&str>,
    ) -> Result<(), CommitLogError> {
        debug!(%id, %status, ?error, "JsonlCommitLog::set_status: called");
        let _locks = self.lock().await?;

        let mut entry = self
            .read_records()
            .await?
            .into_iter()
            .rev()
            .find(|e| &e.id == id)
            .ok_or_else(|| CommitLogError::NotFound(id.clone()))?;

        entry.set_status(status, error);
        self.append_locked(&entry).await
    }
}
