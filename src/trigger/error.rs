//! Trigger execution error types

use std::time::Duration;
use thiserror::Error;

use crate::commitlog::CommitLogError;

/// Errors that can occur while running triggers for an entry
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Trigger failed: {0}")]
    Failed(String),

    #[error("Trigger exited with code {code}: {stderr}")]
    ExitCode { code: i32, stderr: String },

    #[error("Trigger timed out after {0:?}")]
    Timeout(Duration),

    #[error("No trigger configured for table {0}")]
    NoRoute(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to record entry status: {0}")]
    Status(#[from] CommitLogError),
}

impl TriggerError {
    /// Short machine-friendly label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            TriggerError::Failed(_) => "failed",
            TriggerError::ExitCode { .. } => "exit_code",
            TriggerError::Timeout(_) => "timeout",
            TriggerError::NoRoute(_) => "no_route",
            TriggerError::Io(_) => "io",
            TriggerError::Json(_) => "json",
            TriggerError::Status(_) => "status",
        }
    }
}
