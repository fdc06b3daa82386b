//! Dispatcher tunables

use std::time::Duration;

use crate::config::DispatchConfig;

/// Default hand-off queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

/// Default number of workers
pub const DEFAULT_POOL_SIZE: usize = 20;

/// Default sleep after a poll that enqueued nothing
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(1);

/// Default time allowed for tasks to finish on shutdown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings fixed for the lifetime of a dispatcher service
///
/// The pool size is not here: it comes from the
/// [`ConfigSource`](crate::settings::ConfigSource) at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum number of entries waiting for a worker
    pub queue_capacity: usize,

    /// Sleep after a poll that enqueued nothing
    pub idle_interval: Duration,

    /// Time allowed for the dispatcher and workers to stop
    pub shutdown_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl DispatcherConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl From<&DispatchConfig> for DispatcherConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            idle_interval: config.idle_interval(),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_file_defaults() {
        let from_file = DispatcherConfig::from(&DispatchConfig::default());
        assert_eq!(from_file, DispatcherConfig::default());
        assert_eq!(DispatchConfig::default().pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn test_builders() {
        let config = DispatcherConfig::default()
            .with_queue_capacity(3)
            .with_idle_interval(Duration::from_millis(10))
            .with_shutdown_timeout(Duration::from_secs(1));

        assert_eq!(config.queue_capacity, 3);
        assert_eq!(config.idle_interval, Duration::from_millis(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }
}
