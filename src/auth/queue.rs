use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::operation::{OperationKind, UserId};

/// Handle returned by the auth queue for an item whose result must be polled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PollToken(u64);

impl PollToken {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PollToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why the backend refused the submitted credentials or code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Wrong username or password
    InvalidCredentials,
    /// Wrong or stale second-factor code
    InvalidCode,
    /// The account needs a second factor before the login can complete
    MfaRequired {
        method: String,
        destination: Option<String>,
    },
    /// The backend is throttling this account
    RateLimited { retry_after_secs: Option<u64> },
}

impl Rejection {
    /// Rejection assumed when the backend gives no reason
    pub fn default_for(kind: OperationKind) -> Self {
        match kind {
            OperationKind::PasswordLogin => Rejection::InvalidCredentials,
            OperationKind::SecondFactor => Rejection::InvalidCode,
        }
    }
}

/// Final outcome of a submission as reported by the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub success: bool,
    /// Infrastructure-level failure, the operation may succeed if retried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Domain-level failure details, if the backend supplied any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl LoginOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn errored(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn rejected(rejection: Option<Rejection>) -> Self {
        Self {
            rejection,
            ..Self::default()
        }
    }
}

/// What a submission routine hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueResult {
    /// The backend processed the operation synchronously
    Completed(LoginOutcome),
    /// The operation sits in the queue; poll with the token to get its result
    Queued { poll_token: PollToken },
}

/// Answer to a non-blocking status check on a queued item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStatus {
    Pending,
    Processed(LoginOutcome),
}

/// The backend's serialized auth queue
#[async_trait]
pub trait AuthQueue: Send + Sync {
    /// Enqueue a username/password login for `user_id`
    async fn submit_password_login(
        &self,
        user_id: &UserId,
        username: &str,
        password: &str,
    ) -> Result<QueueResult>;

    /// Enqueue redemption of a second-factor code for `user_id`
    async fn submit_second_factor(&self, user_id: &UserId, code: &str) -> Result<QueueResult>;

    /// Check whether a queued item has been processed. Must not block.
    fn poll_status(&self, poll_token: PollToken) -> QueueStatus;
}
