use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::FailedOperationCache;
use crate::notification::{Notification, NotificationOutcome, NotificationSink};
use crate::operation::{OperationToken, UserId};
use crate::orchestrator::{LoginOrchestrator, LoginState};

/// What happened when a user asked to retry a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The cached operation was re-run to the given state
    Dispatched(LoginState),
    /// No cached operation under that token
    Expired,
    /// The token belongs to another user's operation
    NotOwned,
}

/// Re-runs cached failed operations when the user activates a retry affordance
pub struct RetryDispatcher {
    cache: FailedOperationCache,
    orchestrator: Arc<LoginOrchestrator>,
    notifier: Arc<dyn NotificationSink>,
}

impl RetryDispatcher {
    pub fn new(
        cache: FailedOperationCache,
        orchestrator: Arc<LoginOrchestrator>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            cache,
            orchestrator,
            notifier,
        }
    }

    /// Retry the operation cached under `token`.
    ///
    /// The entry is left in place; the orchestrator removes it on success and overwrites
    /// it, under the same token, on another transient failure.
    pub async fn retry(&self, user_id: &UserId, token: OperationToken) -> RetryOutcome {
        let Some(operation) = self.cache.lookup(token) else {
            debug!(user = %user_id, %token, "Retry requested for unknown or expired token");
            self.emit(user_id, NotificationOutcome::RetryExpired { token })
                .await;
            return RetryOutcome::Expired;
        };

        if operation.user_id != *user_id {
            warn!(
                user = %user_id,
                owner = %operation.user_id,
                %token,
                "Retry requested for another user's operation"
            );
            self.emit(user_id, NotificationOutcome::RetryNotOwned { token })
                .await;
            return RetryOutcome::NotOwned;
        }

        info!(user = %user_id, %token, kind = %operation.kind(), "Retrying failed operation");
        let state = self
            .orchestrator
            .submit_and_track(user_id, operation.payload, Some(token))
            .await;
        RetryOutcome::Dispatched(state)
    }

    async fn emit(&self, user_id: &UserId, outcome: NotificationOutcome) {
        if let Err(e) = self
            .notifier
            .notify(Notification::new(user_id.clone(), outcome))
            .await
        {
            warn!(error = %e, "Failed to deliver retry notification");
        }
    }
}
