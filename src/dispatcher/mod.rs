//! Commit log dispatch
//!
//! A single [`Dispatcher`] polls the commit log and claims committed entries
//! in the [`InFlightTracker`] before pushing them onto a bounded
//! [`HandoffQueue`]. A fixed pool of workers pops entries, runs the trigger
//! executor and releases the claim. [`DispatcherService`] wires it together.
//!
//! ```text
//! commit log --poll--> Dispatcher --claim--> tracker
//!                          |
//!                          v
//!                     HandoffQueue --pop--> Worker x N --execute--> trigger
//!                                              |
//!                                              +--release--> tracker
//! ```

mod config;
mod core;
mod error;
mod pool;
mod queue;
mod service;
mod stats;
mod tracker;

pub use config::{
    DEFAULT_IDLE_INTERVAL, DEFAULT_POOL_SIZE, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT, DispatcherConfig,
};
pub use self::core::{Dispatcher, PollOutcome};
pub use error::DispatchError;
pub use pool::{WorkOutcome, Worker, spawn_workers};
pub use queue::{Dispatched, HandoffQueue};
pub use service::DispatcherService;
pub use stats::{DispatchStats, StatsSnapshot};
pub use tracker::{Claim, InFlightTracker};
