//! Domain types for triggerd
//!
//! Core domain types: LogEntry and its identifier and status.

mod entry;
mod id;

pub use entry::{LogEntry, LogEntryStatus, Operation};
pub use id::EntryId;
