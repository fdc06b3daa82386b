//! Worker pool
//!
//! Each worker pops an entry, runs the trigger executor on it and releases
//! its claim, whatever the outcome. Failures and panics end the current
//! entry, never the worker.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::core::wait_for_stop;
use super::error::panic_message;
use super::queue::{Dispatched, HandoffQueue};
use super::stats::DispatchStats;
use crate::trigger::TriggerExecutor;

/// How processing of one entry ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Succeeded,
    Failed,
    Panicked,
}

/// One consumer of the hand-off queue
pub struct Worker {
    index: usize,
    queue: HandoffQueue<Dispatched>,
    executor: Arc<dyn TriggerExecutor>,
    stats: Arc<DispatchStats>,
    stop_rx: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        index: usize,
        queue: HandoffQueue<Dispatched>,
        executor: Arc<dyn TriggerExecutor>,
        stats: Arc<DispatchStats>,
        stop_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            index,
            queue,
            executor,
            stats,
            stop_rx,
        }
    }

    /// Pop and process entries until the stop signal fires
    ///
    /// An entry being processed when the signal fires is finished first.
    pub async fn run(mut self) {
        debug!(worker = self.index, "Worker::run: called");

        loop {
            let item = tokio::select! {
                biased;
                _ = wait_for_stop(&mut self.stop_rx) => break,
                item = self.queue.pop() => item,
            };

            let Some(item) = item else {
                break;
            };
            self.process(item).await;
        }

        debug!(worker = self.index, "Worker stopped");
    }

    /// Execute one entry and release its claim
    pub async fn process(&self, item: Dispatched) -> WorkOutcome {
        let (entry, claim) = item.into_parts();
        debug!(worker = self.index, entry_id = %entry.id, "Worker::process: called");

        let outcome = match AssertUnwindSafe(self.executor.execute(&entry)).catch_unwind().await {
            Ok(Ok(())) => {
                self.stats.record_executed();
                debug!(entry_id = %entry.id, "Trigger executed");
                WorkOutcome::Succeeded
            }
            Ok(Err(e)) => {
                self.stats.record_failed();
                warn!(entry_id = %entry.id, kind = e.kind(), error = %e, "Trigger execution failed");
                WorkOutcome::Failed
            }
            Err(payload) => {
                self.stats.record_panicked();
                error!(
                    entry_id = %entry.id,
                    panic = %panic_message(payload.as_ref()),
                    "Trigger execution panicked"
                );
                WorkOutcome::Panicked
            }
        };

        claim.release();
        outcome
    }
}

/// Spawn `count` workers sharing one queue and executor
pub fn spawn_workers(
    count: usize,
    queue: &HandoffQueue<Dispatched>,
    executor: Arc<dyn TriggerExecutor>,
    stats: Arc<DispatchStats>,
    stop_rx: &watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    debug!(count, "spawn_workers: called");
    (0..count)
        .map(|index| {
            let worker = Worker::new(index, queue.clone(), executor.clone(), stats.clone(), stop_rx.clone());
            tokio::spawn(worker.run())
        })
        .collect()
}
