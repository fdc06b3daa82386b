//! Dispatcher service: owns the loop, the workers and the shared state

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::DispatcherConfig;
use super::core::Dispatcher;
use super::error::DispatchError;
use super::pool::spawn_workers;
use super::queue::{Dispatched, HandoffQueue};
use super::stats::{DispatchStats, StatsSnapshot};
use super::tracker::InFlightTracker;
use crate::commitlog::CommitLogSource;
use crate::settings::{ConfigSource, SettingsError};
use crate::trigger::TriggerExecutor;

/// A running dispatcher with its worker pool
///
/// Built once at startup and passed to whoever needs it. Dropping the
/// service signals every task to stop; [`shutdown`](Self::shutdown) also
/// waits for them.
pub struct DispatcherService {
    tracker: InFlightTracker,
    queue: HandoffQueue<Dispatched>,
    stats: Arc<DispatchStats>,
    pool_size: usize,
    shutdown_timeout: Duration,
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl DispatcherService {
    /// Read the pool size, spawn the workers and start polling
    ///
    /// Fails if the pool size cannot be read or is zero.
    pub async fn start(
        config: DispatcherConfig,
        commit_log: Arc<dyn CommitLogSource>,
        settings: Arc<dyn ConfigSource>,
        executor: Arc<dyn TriggerExecutor>,
    ) -> Result<Self, DispatchError> {
        debug!(?config, "DispatcherService::start: called");

        let pool_size = settings.pool_size().await?;
        if pool_size == 0 {
            return Err(SettingsError::InvalidPoolSize(pool_size.to_string()).into());
        }

        let tracker = InFlightTracker::new();
        let queue = HandoffQueue::new(config.queue_capacity.max(1));
        let stats = Arc::new(DispatchStats::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut handles = spawn_workers(pool_size, &queue, executor, stats.clone(), &stop_rx);

        let dispatcher = Dispatcher::new(
            commit_log,
            settings,
            tracker.clone(),
            queue.clone(),
            stats.clone(),
            config.idle_interval,
            stop_rx,
        );
        handles.push(tokio::spawn(dispatcher.run()));

        info!(
            pool_size,
            queue_capacity = queue.capacity(),
            "Dispatcher service started"
        );

        Ok(Self {
            tracker,
            queue,
            stats,
            pool_size,
            shutdown_timeout: config.shutdown_timeout,
            stop_tx,
            handles,
        })
    }

    pub fn tracker(&self) -> &InFlightTracker {
        &self.tracker
    }

    pub fn queue(&self) -> &HandoffQueue<Dispatched> {
        &self.queue
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.stats.clone()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Stop polling, let workers finish their current entry, and wait
    ///
    /// Tasks still running after the shutdown timeout are aborted. Entries
    /// left in the queue are dropped, which releases their claims.
    pub async fn shutdown(self) -> StatsSnapshot {
        debug!("DispatcherService::shutdown: called");
        let Self {
            queue,
            stats,
            shutdown_timeout,
            stop_tx,
            mut handles,
            ..
        } = self;

        stop_tx.send_replace(true);

        let joined = tokio::time::timeout(shutdown_timeout, join_all(handles.iter_mut())).await;
        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!(error = %e, "Dispatcher task ended abnormally");
                    }
                }
            }
            Err(_) => {
                let stragglers = handles.iter().filter(|h| !h.is_finished()).count();
                warn!(
                    stragglers,
                    timeout_secs = shutdown_timeout.as_secs(),
                    "Shutdown timed out, aborting remaining tasks"
                );
                for handle in &handles {
                    handle.abort();
                }
            }
        }

        let dropped = queue.drain().await;
        if dropped > 0 {
            info!(dropped, "Dropped queued entries on shutdown");
        }

        let snapshot = stats.snapshot();
        info!(
            polls = snapshot.polls,
            enqueued = snapshot.enqueued,
            executed = snapshot.executed,
            failed = snapshot.failed,
            panicked = snapshot.panicked,
            fetch_failures = snapshot.fetch_failures,
            "Dispatcher service stopped"
        );
        snapshot
    }
}
