//! triggerd configuration types and loading

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main triggerd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dispatcher and worker pool settings
    pub dispatch: DispatchConfig,

    /// Commit log location
    #[serde(rename = "commit-log")]
    pub commit_log: CommitLogConfig,

    /// Trigger execution settings
    pub trigger: TriggerConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.pool_size == 0 {
            return Err(eyre::eyre!("dispatch.pool-size must be at least 1"));
        }
        if self.dispatch.queue_capacity == 0 {
            return Err(eyre::eyre!("dispatch.queue-capacity must be at least 1"));
        }
        if self.trigger.command.trim().is_empty() {
            return Err(eyre::eyre!("trigger.command must not be empty"));
        }
        Ok(())
    }

    /// Apply a `TRIGGERD_POOL_SIZE` value on top of `dispatch.pool-size`
    pub fn with_pool_size_override(mut self, raw: Option<&str>) -> Result<Self> {
        if let Some(raw) = raw {
            self.dispatch.pool_size = crate::settings::parse_pool_size(raw)?;
        }
        Ok(self)
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        Ok(Self::load_with_path(config_path)?.0)
    }

    /// Load configuration and report which file it came from
    pub fn load_with_path(config_path: Option<&PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            let config = Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()))?;
            return Ok((config, Some(path.clone())));
        }

        // Try project-local config: .triggerd.yml
        let local_config = PathBuf::from(".triggerd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok((config, Some(local_config))),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/triggerd/triggerd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("triggerd").join("triggerd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok((config, Some(user_config))),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok((Self::default(), None))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Dispatcher and worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Whether the dispatcher reads the commit log at all
    pub enabled: bool,

    /// Number of workers started at boot
    #[serde(rename = "pool-size")]
    pub pool_size: usize,

    /// Hand-off queue capacity
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,

    /// Sleep between polls that enqueue nothing, in milliseconds
    #[serde(rename = "idle-interval-ms")]
    pub idle_interval_ms: u64,

    /// How long shutdown waits for workers, in seconds
    #[serde(rename = "shutdown-timeout-secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pool_size: 20,
            queue_capacity: 500,
            idle_interval_ms: 1000,
            shutdown_timeout_secs: 30,
        }
    }
}

impl DispatchConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Commit log location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitLogConfig {
    /// Path of the JSONL commit log
    pub path: PathBuf,
}

impl Default for CommitLogConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/triggerd on Linux)
        let path = dirs::data_dir()
            .map(|d| d.join("triggerd"))
            .unwrap_or_else(|| PathBuf::from(".triggerd"))
            .join("commitlog.jsonl");

        Self { path }
    }
}

/// Trigger execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Default shell command run for every entry
    pub command: String,

    /// Per-entry execution timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Commands for specific tables, keyed by `keyspace.table`
    pub routes: HashMap<String, String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            command: "cat".to_string(),
            timeout_ms: 60_000,
            routes: HashMap::new(),
        }
    }
}

impl TriggerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
