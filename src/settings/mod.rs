//! Runtime settings consulted by the dispatcher
//!
//! `is_dispatch_enabled` is read on every poll so it can be flipped while
//! the service runs. `pool_size` is read once at startup.

use async_trait::async_trait;
use thiserror::Error;

mod file;
mod fixed;

pub use file::{FileConfigSource, POOL_SIZE_ENV};
pub use fixed::StaticConfigSource;

/// Errors from reading runtime settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid pool size '{0}': expected a positive integer")]
    InvalidPoolSize(String),
}

/// Source of the dispatch flag and pool size
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Whether the dispatcher should poll the commit log right now
    async fn is_dispatch_enabled(&self) -> Result<bool, SettingsError>;

    /// Number of workers to start
    async fn pool_size(&self) -> Result<usize, SettingsError>;
}

/// Parse a pool size override, rejecting zero
pub(crate) fn parse_pool_size(raw: &str) -> Result<usize, SettingsError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SettingsError::InvalidPoolSize(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pool_size() {
        assert_eq!(parse_pool_size("20").unwrap(), 20);
        assert_eq!(parse_pool_size(" 4 ").unwrap(), 4);
        assert!(matches!(parse_pool_size("0"), Err(SettingsError::InvalidPoolSize(_))));
        assert!(matches!(parse_pool_size("many"), Err(SettingsError::InvalidPoolSize(_))));
    }

    #[test]
    fn test_invalid_pool_size_message() {
        let err = SettingsError::InvalidPoolSize("-3".to_string());
        assert!(err.to_string().contains("-3"));
    }
}
