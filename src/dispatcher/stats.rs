//! Dispatch counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by the dispatcher and workers
#[derive(Debug, Default)]
pub struct DispatchStats {
    polls: AtomicU64,
    idle_polls: AtomicU64,
    enqueued: AtomicU64,
    skipped_in_flight: AtomicU64,
    fetch_failures: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`]
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub polls: u64,
    pub idle_polls: u64,
    pub enqueued: u64,
    pub skipped_in_flight: u64,
    pub fetch_failures: u64,
    pub executed: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_poll(&self) {
        self.polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_in_flight(&self) {
        self.skipped_in_flight.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            skipped_in_flight: self.skipped_in_flight.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Entries whose processing finished, whatever the outcome
    pub fn processed(&self) -> u64 {
        self.executed + self.failed + self.panicked
    }
}
