//! Settings read from the YAML config file

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{ConfigSource, SettingsError, parse_pool_size};
use crate::config::Config;

/// Environment variable that overrides `dispatch.pool-size`
pub const POOL_SIZE_ENV: &str = "TRIGGERD_POOL_SIZE";

/// Settings backed by a config file that may be edited while running
///
/// The file is re-read on every `is_dispatch_enabled` call, so edits show
/// up within one poll interval.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
    pool_size_override: Option<String>,
}

impl FileConfigSource {
    /// Create a source for `path`, picking up `TRIGGERD_POOL_SIZE` if set
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool_size_override: std::env::var(POOL_SIZE_ENV).ok(),
        }
    }

    /// Replace the pool size override (None disables it)
    pub fn with_pool_size_override(mut self, raw: Option<String>) -> Self {
        self.pool_size_override = raw;
        self
    }

    async fn read(&self) -> Result<Config, SettingsError> {
        debug!(path = ?self.path, "FileConfigSource::read: called");
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn is_dispatch_enabled(&self) -> Result<bool, SettingsError> {
        Ok(self.read().await?.dispatch.enabled)
    }

    async fn pool_size(&self) -> Result<usize, SettingsError> {
        if let Some(raw) = &self.pool_size_override {
            debug!(%raw, "FileConfigSource::pool_size: using override");
            return parse_pool_size(raw);
        }
        match self.read().await?.dispatch.pool_size {
            0 => Err(SettingsError::InvalidPoolSize("0".to_string())),
            size => Ok(size),
        }
    }
}
