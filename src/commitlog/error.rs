//! Commit log error types

use thiserror::Error;

use crate::domain::EntryId;

/// Errors that can occur while reading or writing the commit log
#[derive(Debug, Error)]
pub enum CommitLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Entry not found: {0}")]
    NotFound(EntryId),

    #[error("Commit log unavailable: {0}")]
    Unavailable(String),
}

impl CommitLogError {
    /// Check if a later poll may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            CommitLogError::Io(_) => true,
            CommitLogError::Unavailable(_) => true,
            CommitLogError::Json(_) => false,
            CommitLogError::NotFound(_) => false,
        }
    }
}
