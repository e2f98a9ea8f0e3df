//! Semantic notifications emitted to the chat front-end.
//!
//! The core only decides *what* happened (outcome kind, message, retry token); rendering
//! and localisation belong to whoever consumes a [`NotificationSink`].

pub mod broadcast;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::Rejection;
use crate::operation::{OperationKind, OperationToken, UserId};

pub use broadcast::BroadcastNotifier;

/// Notification addressed to the user who triggered an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub outcome: NotificationOutcome,
}

impl Notification {
    pub fn new(user_id: UserId, outcome: NotificationOutcome) -> Self {
        Self { user_id, outcome }
    }

    /// The retry affordance carried by this notification, if any
    pub fn retry_token(&self) -> Option<OperationToken> {
        match &self.outcome {
            NotificationOutcome::RetryableFailure { token, .. } => Some(*token),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationOutcome {
    /// The user is now logged in
    LoggedIn {
        kind: OperationKind,
        username: String,
    },
    /// A transient failure; the front-end should offer a retry bound to `token`
    RetryableFailure {
        kind: OperationKind,
        token: OperationToken,
        message: String,
    },
    /// Final failure caused by the submitted credentials or code
    Rejected {
        kind: OperationKind,
        rejection: Rejection,
    },
    /// The retry target is gone (evicted by the sweep or never valid)
    RetryExpired { token: OperationToken },
    /// Someone other than the original requester tried to retry the operation
    RetryNotOwned { token: OperationToken },
}

/// Destination for notifications, typically a chat follow-up message
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}
