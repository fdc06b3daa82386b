//! Commit log access
//!
//! The dispatcher only reads the commit log through [`CommitLogSource`].
//! Trigger implementations report the final status of an entry through
//! [`StatusSink`]. Two implementations ship with the crate:
//!
//! - [`JsonlCommitLog`] - append-only JSONL file, latest record per id wins
//! - [`InMemoryCommitLog`] - the same contract held in memory

use async_trait::async_trait;

use crate::domain::{EntryId, LogEntry, LogEntryStatus};

mod error;
mod jsonl;
mod memory;

pub use error::CommitLogError;
pub use jsonl::JsonlCommitLog;
pub use memory::InMemoryCommitLog;

/// Read side of the commit log
#[async_trait]
pub trait CommitLogSource: Send + Sync {
    /// List entries that are not yet fully processed, in log order
    async fn get_pending(&self) -> Result<Vec<LogEntry>, CommitLogError>;
}

/// Write side used by trigger execution to record outcomes
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Transition an entry to `status`, attaching `error` if given
    async fn set_status(&self, id: &EntryId, status: LogEntryStatus, error: Option<&str>) -> Result<(), CommitLogError>;
}

/// Fold a sequence of records so the latest record per id wins,
/// keeping first-seen order.
pub(crate) fn fold_latest(records: impl IntoIterator<Item = LogEntry>) -> Vec<LogEntry> {
    let mut index = std::collections::HashMap::new();
    let mut latest: Vec<LogEntry> = Vec::new();

    for record in records {
        match index.get(&record.id) {
            Some(&pos) => latest[pos] = record,
            None => {
                index.insert(record.id.clone(), latest.len());
                latest.push(record);
            }
        }
    }

    latest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_latest_keeps_first_seen_order() {
        let records = vec![
            LogEntry::with_id("a", "ks", "t", "1"),
            LogEntry::with_id("b", "ks", "t", "2"),
            LogEntry::with_id("a", "ks", "t", "1").with_status(LogEntryStatus::Complete),
        ];

        let folded = fold_latest(records);

        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].id.as_str(), "a");
        assert_eq!(folded[0].status, LogEntryStatus::Complete);
        assert_eq!(folded[1].id.as_str(), "b");
    }
}
