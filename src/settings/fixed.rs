//! In-process settings backed by atomics

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::info;

use super::{ConfigSource, SettingsError};

/// Settings held in memory and flipped at runtime
#[derive(Debug)]
pub struct StaticConfigSource {
    enabled: AtomicBool,
    pool_size: AtomicUsize,
}

impl StaticConfigSource {
    pub fn new(enabled: bool, pool_size: usize) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            pool_size: AtomicUsize::new(pool_size),
        }
    }

    /// Turn dispatching on or off; takes effect on the next poll
    pub fn set_dispatch_enabled(&self, enabled: bool) {
        let previous = self.enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "Dispatch flag changed");
        }
    }
}

impl Default for StaticConfigSource {
    fn default() -> Self {
        Self::new(true, 20)
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn is_dispatch_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    async fn pool_size(&self) -> Result<usize, SettingsError> {
        Ok(self.pool_size.load(Ordering::SeqCst))
    }
}
