//! Shell command trigger
//!
//! Runs `sh -c <command>` once per entry. The entry is written to stdin as
//! JSON and its id, keyspace and table are exported as environment variables.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{TriggerError, TriggerExecutor};
use crate::commitlog::StatusSink;
use crate::domain::{LogEntry, LogEntryStatus};

/// Trigger that pipes each entry into a shell command
pub struct CommandTrigger {
    command: String,
    timeout: Duration,
    status: Option<Arc<dyn StatusSink>>,
}

impl CommandTrigger {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
            status: None,
        }
    }

    /// Record `Complete` / `Error` in the commit log after each run
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status = Some(sink);
        self
    }

    async fn run(&self, entry: &LogEntry) -> Result<(), TriggerError> {
        let payload = serde_json::to_vec(entry)?;

        let run = async move {
            let mut child = Command::new("sh")
                .arg("-c")
                .arg(&self.command)
                .env("TRIGGERD_ENTRY_ID", entry.id.as_str())
                .env("TRIGGERD_KEYSPACE", &entry.keyspace)
                .env("TRIGGERD_TABLE", &entry.table)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()?;

            // Write stdin and drain output together; a full stdout pipe stalls the write
            let stdin = child.stdin.take();
            let feed = async move {
                let Some(mut stdin) = stdin else {
                    return Ok(());
                };
                match stdin.write_all(&payload).await {
                    // Commands that ignore stdin close it early
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                    _ => Ok(()),
                }
            };

            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            fed?;
            Ok::<_, TriggerError>(output?)
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result?,
            Err(_) => {
                debug!(entry_id = %entry.id, "CommandTrigger::run: command timed out");
                return Err(TriggerError::Timeout(self.timeout));
            }
        };

        if output.status.success() {
            debug!(entry_id = %entry.id, stdout_len = output.stdout.len(), "CommandTrigger::run: command succeeded");
            return Ok(());
        }

        Err(TriggerError::ExitCode {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[async_trait]
impl TriggerExecutor for CommandTrigger {
    async fn execute(&self, entry: &LogEntry) -> Result<(), TriggerError> {
        debug!(entry_id = %entry.id, command = %self.command, "CommandTrigger::execute: called");
        let result = self.run(entry).await;

        let Some(sink) = &self.status else {
            return result;
        };

        match result {
            Ok(()) => {
                sink.set_status(&entry.id, LogEntryStatus::Complete, None).await?;
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(status_err) = sink.set_status(&entry.id, LogEntryStatus::Error, Some(&message)).await {
                    warn!(entry_id = %entry.id, error = %status_err, "Failed to record trigger failure");
                }
                Err(e)
            }
        }
    }
}
