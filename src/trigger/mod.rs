//! Trigger execution
//!
//! Workers hand every dispatched entry to a [`TriggerExecutor`]. What the
//! trigger does is up to the implementation; it also owns the final status
//! transition of the entry in the commit log.

use async_trait::async_trait;

use crate::domain::LogEntry;

mod command;
mod error;
mod router;

pub use command::CommandTrigger;
pub use error::TriggerError;
pub use router::TriggerRouter;

/// Side effect run for each dispatched log entry
#[async_trait]
pub trait TriggerExecutor: Send + Sync {
    /// Run triggers for `entry`
    async fn execute(&self, entry: &LogEntry) -> Result<(), TriggerError>;
}
