//! Dispatcher error types

use std::any::Any;

use thiserror::Error;

use crate::commitlog::CommitLogError;
use crate::settings::SettingsError;

/// Errors raised by one dispatcher iteration
///
/// None of these stop the dispatcher; the loop logs them and treats the
/// iteration as having produced no work.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Settings read failed: {0}")]
    Settings(#[from] SettingsError),

    #[error("Commit log fetch failed: {0}")]
    CommitLog(#[from] CommitLogError),

    #[error("Hand-off queue closed")]
    QueueClosed,

    #[error("{stage} panicked: {message}")]
    Panicked { stage: &'static str, message: String },

    #[error("Stop requested")]
    Stopped,
}

impl DispatchError {
    /// Check if the next iteration is expected to succeed without intervention
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Settings(SettingsError::Read(_)) => true,
            DispatchError::Settings(_) => false,
            DispatchError::CommitLog(e) => e.is_transient(),
            DispatchError::QueueClosed => false,
            DispatchError::Panicked { .. } => false,
            DispatchError::Stopped => false,
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient() {
        let io = std::io::Error::other("disk gone");
        assert!(DispatchError::Settings(SettingsError::Read(io)).is_transient());
        assert!(DispatchError::CommitLog(CommitLogError::Unavailable("down".to_string())).is_transient());
        assert!(!DispatchError::QueueClosed.is_transient());
        assert!(
            !DispatchError::Panicked {
                stage: "fetch",
                message: "boom".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_panicked_message() {
        let err = DispatchError::Panicked {
            stage: "fetch",
            message: "index out of bounds".to_string(),
        };
        assert_eq!(err.to_string(), "fetch panicked: index out of bounds");
    }
}
