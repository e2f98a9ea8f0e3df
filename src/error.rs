use thiserror::Error;

use crate::operation::{OperationKind, UserId};

/// Transient failures of a login attempt.
///
/// Every variant is retryable: the orchestrator caches the operation and offers the
/// user a retry affordance whose message is this error's `Display` text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// The backend reported an infrastructure error (timeout, upstream outage, ...)
    #[error("Auth backend error: {message}")]
    Backend { message: String },

    /// The submission routine itself could not enqueue the operation
    #[error("Failed to submit {kind} to the auth queue: {reason}")]
    SubmissionFailed { kind: OperationKind, reason: String },

    /// The backend reported success but no session exists for the user yet
    #[error("Login succeeded but no session could be resolved for user {user_id}")]
    SessionUnresolved { user_id: UserId },
}

impl LoginError {
    /// Create a backend error from any message
    pub fn backend(message: impl Into<String>) -> Self {
        LoginError::Backend {
            message: message.into(),
        }
    }

    /// Create a submission error for the given operation kind
    pub fn submission_failed(kind: OperationKind, reason: impl std::fmt::Display) -> Self {
        LoginError::SubmissionFailed {
            kind,
            reason: reason.to_string(),
        }
    }
}

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value for '{key}': {reason}")]
    Invalid { key: String, reason: String },

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
