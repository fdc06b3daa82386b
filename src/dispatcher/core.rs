//! Dispatcher loop
//!
//! Polls the commit log, claims committed entries that are not already in
//! flight and hands them to the worker pool. Sleeps for the idle interval
//! whenever a poll enqueues nothing.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::error::{DispatchError, panic_message};
use super::queue::{Dispatched, HandoffQueue};
use super::stats::DispatchStats;
use super::tracker::InFlightTracker;
use crate::commitlog::CommitLogSource;
use crate::settings::ConfigSource;

/// Result of one dispatcher iteration
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Dispatching was switched off; the commit log was not read
    pub disabled: bool,

    /// Entries claimed and pushed onto the queue
    pub enqueued: usize,

    /// Committed entries skipped because they were already in flight
    pub skipped_in_flight: usize,

    /// Pending entries skipped because they are not committed yet
    pub skipped_status: usize,
}

impl PollOutcome {
    /// Whether the loop should back off before the next poll
    pub fn is_idle(&self) -> bool {
        self.enqueued == 0
    }
}

/// Resolve once the stop flag is set or its sender is gone
pub(crate) async fn wait_for_stop(stop_rx: &mut watch::Receiver<bool>) {
    let _ = stop_rx.wait_for(|stopped| *stopped).await;
}

/// Await a collaborator call, turning a panic into [`DispatchError::Panicked`]
async fn guarded<T, E, F>(stage: &'static str, fut: F) -> Result<T, DispatchError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<DispatchError>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result.map_err(Into::into),
        Err(payload) => Err(DispatchError::Panicked {
            stage,
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// The polling half of the service
pub struct Dispatcher {
    commit_log: Arc<dyn CommitLogSource>,
    settings: Arc<dyn ConfigSource>,
    tracker: InFlightTracker,
    queue: HandoffQueue<Dispatched>,
    stats: Arc<DispatchStats>,
    idle_interval: Duration,
    stop_rx: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(
        commit_log: Arc<dyn CommitLogSource>,
        settings: Arc<dyn ConfigSource>,
        tracker: InFlightTracker,
        queue: HandoffQueue<Dispatched>,
        stats: Arc<DispatchStats>,
        idle_interval: Duration,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            commit_log,
            settings,
            tracker,
            queue,
            stats,
            idle_interval,
            stop_rx,
        }
    }

    /// Run a single iteration without sleeping
    ///
    /// Blocks while the queue is full. Returns [`DispatchError::Stopped`] if
    /// the stop signal fires during that wait.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, DispatchError> {
        debug!("Dispatcher::poll_once: called");

        if !guarded("settings", self.settings.is_dispatch_enabled()).await? {
            debug!("Dispatch disabled, skipping commit log");
            return Ok(PollOutcome {
                disabled: true,
                ..Default::default()
            });
        }

        let entries = match guarded("fetch", self.commit_log.get_pending()).await {
            Ok(entries) => entries,
            Err(e) => {
                self.stats.record_fetch_failure();
                return Err(e);
            }
        };

        let mut outcome = PollOutcome::default();
        for entry in entries {
            if !entry.is_dispatchable() {
                outcome.skipped_status += 1;
                continue;
            }

            let Some(claim) = self.tracker.try_claim(&entry.id) else {
                outcome.skipped_in_flight += 1;
                self.stats.record_skipped_in_flight();
                continue;
            };

            let id = entry.id.clone();
            tokio::select! {
                biased;
                _ = wait_for_stop(&mut self.stop_rx) => return Err(DispatchError::Stopped),
                pushed = self.queue.push(Dispatched::new(entry, claim)) => pushed?,
            }

            outcome.enqueued += 1;
            self.stats.record_enqueued();
            debug!(entry_id = %id, queued = self.queue.len(), "Entry enqueued");
        }

        Ok(outcome)
    }

    /// Run the dispatch loop until the stop signal fires
    pub async fn run(mut self) {
        info!(
            idle_interval_ms = self.idle_interval.as_millis() as u64,
            queue_capacity = self.queue.capacity(),
            "Dispatcher started"
        );

        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            self.stats.record_poll();
            let idle = match self.poll_once().await {
                Ok(outcome) => {
                    if outcome.enqueued > 0 || outcome.skipped_in_flight > 0 {
                        debug!(
                            enqueued = outcome.enqueued,
                            skipped_in_flight = outcome.skipped_in_flight,
                            skipped_status = outcome.skipped_status,
                            "Poll complete"
                        );
                    }
                    outcome.is_idle()
                }
                Err(DispatchError::Stopped) => break,
                Err(e) => {
                    warn!(error = %e, transient = e.is_transient(), "Dispatch iteration failed");
                    true
                }
            };

            if idle {
                self.stats.record_idle();
                tokio::select! {
                    _ = tokio::time::sleep(self.idle_interval) => {}
                    _ = wait_for_stop(&mut self.stop_rx) => break,
                }
            }
        }

        info!("Dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitlog::{CommitLogError, InMemoryCommitLog};
    use crate::domain::{LogEntry, LogEntryStatus};
    use crate::settings::{SettingsError, StaticConfigSource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        dispatcher: Dispatcher,
        tracker: InFlightTracker,
        queue: HandoffQueue<Dispatched>,
        stats: Arc<DispatchStats>,
        stop_tx: watch::Sender<bool>,
    }

    fn harness(commit_log: Arc<dyn CommitLogSource>, settings: Arc<dyn ConfigSource>, capacity: usize) -> Harness {
        harness_with_idle(commit_log, settings, capacity, Duration::from_millis(20))
    }

    fn harness_with_idle(
        commit_log: Arc<dyn CommitLogSource>,
        settings: Arc<dyn ConfigSource>,
        capacity: usize,
        idle_interval: Duration,
    ) -> Harness {
        let tracker = InFlightTracker::new();
        let queue = HandoffQueue::new(capacity);
        let stats = Arc::new(DispatchStats::new());
        let (stop_tx, stop_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(
            commit_log,
            settings,
            tracker.clone(),
            queue.clone(),
            stats.clone(),
            idle_interval,
            stop_rx,
        );
        Harness {
            dispatcher,
            tracker,
            queue,
            stats,
            stop_tx,
        }
    }

    /// Counts fetches and fails the first `failures` of them
    struct FlakyLog {
        inner: InMemoryCommitLog,
        fetches: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl CommitLogSource for FlakyLog {
        async fn get_pending(&self) -> Result<Vec<LogEntry>, CommitLogError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(CommitLogError::Unavailable("connection refused".to_string()));
            }
            self.inner.get_pending().await
        }
    }

    struct PanickingLog;

    #[async_trait]
    impl CommitLogSource for PanickingLog {
        async fn get_pending(&self) -> Result<Vec<LogEntry>, CommitLogError> {
            panic!("corrupt segment");
        }
    }

    struct BrokenSettings;

    #[async_trait]
    impl ConfigSource for BrokenSettings {
        async fn is_dispatch_enabled(&self) -> Result<bool, SettingsError> {
            Err(SettingsError::InvalidPoolSize("n/a".to_string()))
        }

        async fn pool_size(&self) -> Result<usize, SettingsError> {
            Ok(1)
        }
    }

    fn committed(row: &str) -> LogEntry {
        LogEntry::new("shop", "orders", row)
    }

    #[tokio::test]
    async fn test_poll_enqueues_committed_entries_in_order() {
        let log = Arc::new(InMemoryCommitLog::with_entries(vec![
            committed("r1"),
            committed("r2").with_status(LogEntryStatus::Prepared),
            committed("r3"),
        ]));
        let mut h = harness(log, Arc::new(StaticConfigSource::default()), 10);

        let outcome = h.dispatcher.poll_once().await.unwrap();
        assert_eq!(outcome.enqueued, 2);
        assert_eq!(outcome.skipped_status, 1);
        assert!(!outcome.is_idle());

        let first = h.queue.pop().await.unwrap();
        let second = h.queue.pop().await.unwrap();
        assert_eq!(first.entry().row_key, "r1");
        assert_eq!(second.entry().row_key, "r3");
        assert!(h.tracker.contains(&first.entry().id));
        assert_eq!(h.stats.snapshot().enqueued, 2);
    }

    #[tokio::test]
    async fn test_in_flight_entry_is_not_enqueued_twice() {
        let entry = committed("r1");
        let log = Arc::new(InMemoryCommitLog::with_entries(vec![entry.clone()]));
        let mut h = harness(log, Arc::new(StaticConfigSource::default()), 10);

        assert_eq!(h.dispatcher.poll_once().await.unwrap().enqueued, 1);

        let again = h.dispatcher.poll_once().await.unwrap();
        assert_eq!(again.enqueued, 0);
        assert_eq!(again.skipped_in_flight, 1);
        assert_eq!(h.queue.len(), 1);

        // Once released it becomes eligible again
        let (_, claim) = h.queue.pop().await.unwrap().into_parts();
        claim.release();
        assert_eq!(h.dispatcher.poll_once().await.unwrap().enqueued, 1);
    }

    #[tokio::test]
    async fn test_disabled_dispatch_skips_fetch() {
        let log = Arc::new(FlakyLog {
            inner: InMemoryCommitLog::with_entries(vec![committed("r1")]),
            fetches: AtomicUsize::new(0),
            failures: 0,
        });
        let settings = Arc::new(StaticConfigSource::new(false, 1));
        let mut h = harness(log.clone(), settings.clone(), 10);

        let outcome = h.dispatcher.poll_once().await.unwrap();
        assert!(outcome.disabled);
        assert!(outcome.is_idle());
        assert_eq!(log.fetches.load(Ordering::SeqCst), 0);
        assert!(h.queue.is_empty());

        settings.set_dispatch_enabled(true);
        assert_eq!(h.dispatcher.poll_once().await.unwrap().enqueued, 1);
        assert_eq!(log.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let log = Arc::new(FlakyLog {
            inner: InMemoryCommitLog::with_entries(vec![committed("r1")]),
            fetches: AtomicUsize::new(0),
            failures: 1,
        });
        let mut h = harness(log, Arc::new(StaticConfigSource::default()), 10);

        let err = h.dispatcher.poll_once().await.unwrap_err();
        assert!(matches!(err, DispatchError::CommitLog(_)));
        assert!(err.is_transient());
        assert_eq!(h.stats.snapshot().fetch_failures, 1);

        assert_eq!(h.dispatcher.poll_once().await.unwrap().enqueued, 1);
    }

    #[tokio::test]
    async fn test_fetch_panic_becomes_error() {
        let mut h = harness(Arc::new(PanickingLog), Arc::new(StaticConfigSource::default()), 10);

        match h.dispatcher.poll_once().await {
            Err(DispatchError::Panicked { stage, message }) => {
                assert_eq!(stage, "fetch");
                assert!(message.contains("corrupt segment"));
            }
            other => panic!("Expected Panicked, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_settings_error_is_reported() {
        let log = Arc::new(InMemoryCommitLog::new());
        let mut h = harness(log, Arc::new(BrokenSettings), 10);

        let err = h.dispatcher.poll_once().await.unwrap_err();
        assert!(matches!(err, DispatchError::Settings(_)));
    }

    #[tokio::test]
    async fn test_stop_while_queue_full() {
        let log = Arc::new(InMemoryCommitLog::with_entries(vec![committed("r1"), committed("r2")]));
        let mut h = harness(log, Arc::new(StaticConfigSource::default()), 1);

        let stop_tx = h.stop_tx;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop_tx.send_replace(true);
        });

        let err = h.dispatcher.poll_once().await.unwrap_err();
        assert!(matches!(err, DispatchError::Stopped));

        // The entry that never made it onto the queue is not left in flight
        assert_eq!(h.queue.len(), 1);
        assert_eq!(h.tracker.len(), 1);
    }

    #[tokio::test]
    async fn test_run_survives_failures_and_stops() {
        let log = Arc::new(FlakyLog {
            inner: InMemoryCommitLog::with_entries(vec![committed("r1")]),
            fetches: AtomicUsize::new(0),
            failures: 2,
        });
        let h = harness(log.clone(), Arc::new(StaticConfigSource::default()), 10);
        let queue = h.queue.clone();
        let stats = h.stats.clone();
        let handle = tokio::spawn(h.dispatcher.run());

        let dispatched = tokio::time::timeout(Duration::from_secs(2), queue.pop())
            .await
            .expect("entry should be enqueued after the fetch recovers")
            .unwrap();
        assert_eq!(dispatched.entry().row_key, "r1");
        assert!(log.fetches.load(Ordering::SeqCst) >= 3);

        h.stop_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        let snap = stats.snapshot();
        assert_eq!(snap.fetch_failures, 2);
        assert!(snap.idle_polls >= 2);
    }

    #[tokio::test]
    async fn test_run_polls_again_without_sleeping_after_enqueue() {
        let log = Arc::new(InMemoryCommitLog::with_entries(vec![committed("r1"), committed("r2")]));
        let h = harness_with_idle(log, Arc::new(StaticConfigSource::default()), 10, Duration::from_secs(30));
        let stats = h.stats.clone();
        let handle = tokio::spawn(h.dispatcher.run());

        // The second poll only happens this soon if the first one did not sleep
        let second_poll = tokio::time::timeout(Duration::from_secs(1), async {
            while stats.snapshot().skipped_in_flight < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(second_poll.is_ok(), "dispatcher slept after an enqueueing poll");

        let snap = stats.snapshot();
        assert_eq!(snap.polls, 2);
        assert_eq!(snap.enqueued, 2);
        assert_eq!(snap.idle_polls, 1);

        h.stop_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
