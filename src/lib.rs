//! triggerd - commit log trigger dispatcher
//!
//! triggerd polls an append-only commit log of database mutations and hands
//! every committed entry to a fixed pool of trigger workers. An entry is never
//! worked on by two workers at once, and the hand-off queue is bounded so a
//! burst of commits backs up in the log rather than in memory.
//!
//! # Modules
//!
//! - [`dispatcher`] - polling loop, in-flight tracker, hand-off queue, worker pool
//! - [`commitlog`] - commit log traits plus JSONL and in-memory logs
//! - [`settings`] - dispatch flag and pool size sources
//! - [`trigger`] - trigger executor trait, shell command trigger, router
//! - [`domain`] - log entry types
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod commitlog;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod settings;
pub mod trigger;

// Re-export commonly used types
pub use commitlog::{CommitLogError, CommitLogSource, InMemoryCommitLog, JsonlCommitLog, StatusSink};
pub use config::Config;
pub use dispatcher::{
    Claim, DispatchError, DispatchStats, Dispatched, Dispatcher, DispatcherConfig, DispatcherService, HandoffQueue,
    InFlightTracker, PollOutcome, StatsSnapshot,
};
pub use domain::{EntryId, LogEntry, LogEntryStatus, Operation};
pub use settings::{ConfigSource, FileConfigSource, SettingsError, StaticConfigSource};
pub use trigger::{CommandTrigger, TriggerError, TriggerExecutor, TriggerRouter};
