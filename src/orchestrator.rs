//! Login state machine shared by every operation kind.
//!
//! ```text
//! SUBMITTING -> (WAITING_IN_QUEUE)? -> CLASSIFYING -> Succeeded
//!                                                   | FailedRetryable
//!                                                   | FailedTerminal
//! ```
//!
//! Kind-specific behaviour lives in [`OperationPayload`]; the machine itself is identical
//! for password logins and second-factor codes.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::auth::{
    wait_for_result, AuthQueue, LoginOutcome, QueueResult, Rejection, Session, SessionResolver,
};
use crate::cache::{FailedOperationCache, TokenGenerator};
use crate::error::LoginError;
use crate::notification::{Notification, NotificationOutcome, NotificationSink};
use crate::operation::{OperationPayload, OperationToken, PendingOperation, UserId};

/// Terminal state reached by one run of the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Succeeded { username: String },
    FailedRetryable { token: OperationToken, error: LoginError },
    FailedTerminal { rejection: Rejection },
}

impl LoginState {
    pub fn retry_token(&self) -> Option<OperationToken> {
        match self {
            LoginState::FailedRetryable { token, .. } => Some(*token),
            _ => None,
        }
    }
}

/// Result of classifying a resolved outcome
enum Classification {
    Succeeded(Session),
    Retryable(LoginError),
    Terminal(Rejection),
}

impl OperationPayload {
    /// Hand the payload to the submission routine matching its kind
    async fn submit_to(
        &self,
        queue: &dyn AuthQueue,
        user_id: &UserId,
    ) -> anyhow::Result<QueueResult> {
        match self {
            OperationPayload::PasswordLogin { username, password } => {
                queue.submit_password_login(user_id, username, password).await
            }
            OperationPayload::SecondFactor { code } => {
                queue.submit_second_factor(user_id, code).await
            }
        }
    }
}

/// Drives credential submissions to a terminal state and caches retryable failures
pub struct LoginOrchestrator {
    queue: Arc<dyn AuthQueue>,
    sessions: Arc<dyn SessionResolver>,
    notifier: Arc<dyn NotificationSink>,
    cache: FailedOperationCache,
    tokens: TokenGenerator,
    poll_interval: Duration,
}

impl LoginOrchestrator {
    pub fn new(
        queue: Arc<dyn AuthQueue>,
        sessions: Arc<dyn SessionResolver>,
        notifier: Arc<dyn NotificationSink>,
        cache: FailedOperationCache,
        tokens: TokenGenerator,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            sessions,
            notifier,
            cache,
            tokens,
            poll_interval,
        }
    }

    /// Submit `payload` on behalf of `user_id` and run it to a terminal state.
    ///
    /// `existing_token` is set when this run retries a cached operation: a success then
    /// removes that entry and another transient failure overwrites it in place.
    pub async fn submit_and_track(
        &self,
        user_id: &UserId,
        payload: OperationPayload,
        existing_token: Option<OperationToken>,
    ) -> LoginState {
        let kind = payload.kind();
        let span = info_span!(
            "login",
            attempt = %Uuid::new_v4(),
            user = %user_id,
            %kind,
            retry_token = ?existing_token.map(OperationToken::value),
        );

        async move {
            debug!("Submitting credentials to auth queue");
            let classification = match self.resolve(user_id, &payload).await {
                Ok(outcome) => self.classify(user_id, &payload, outcome),
                Err(err) => Classification::Retryable(err),
            };

            match classification {
                Classification::Succeeded(session) => {
                    info!(username = %session.username, "Logged in");
                    if let Some(token) = existing_token {
                        self.cache.remove_owned(token, user_id);
                    }
                    self.emit(
                        user_id,
                        NotificationOutcome::LoggedIn {
                            kind,
                            username: session.username.clone(),
                        },
                    )
                    .await;
                    LoginState::Succeeded {
                        username: session.username,
                    }
                }
                Classification::Retryable(err) => {
                    error!(error = %err, "Login failed with a retryable error");
                    let token = self.track_failure(user_id, payload, existing_token);
                    self.emit(
                        user_id,
                        NotificationOutcome::RetryableFailure {
                            kind,
                            token,
                            message: err.to_string(),
                        },
                    )
                    .await;
                    LoginState::FailedRetryable { token, error: err }
                }
                Classification::Terminal(rejection) => {
                    info!(?rejection, "Login rejected");
                    self.emit(
                        user_id,
                        NotificationOutcome::Rejected {
                            kind,
                            rejection: rejection.clone(),
                        },
                    )
                    .await;
                    LoginState::FailedTerminal { rejection }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// SUBMITTING and, for queued submissions, WAITING_IN_QUEUE
    async fn resolve(
        &self,
        user_id: &UserId,
        payload: &OperationPayload,
    ) -> Result<LoginOutcome, LoginError> {
        let result = payload
            .submit_to(self.queue.as_ref(), user_id)
            .await
            .map_err(|e| LoginError::submission_failed(payload.kind(), e))?;

        Ok(wait_for_result(self.queue.as_ref(), result, self.poll_interval).await)
    }

    /// Success needs both the backend's word and a resolvable session; success without a
    /// session goes down the retryable path instead of being dropped.
    fn classify(
        &self,
        user_id: &UserId,
        payload: &OperationPayload,
        outcome: LoginOutcome,
    ) -> Classification {
        if outcome.success {
            if let Some(session) = self.sessions.resolve_session(user_id) {
                return Classification::Succeeded(session);
            }
        }

        if let Some(message) = outcome.error {
            return Classification::Retryable(LoginError::Backend { message });
        }

        if outcome.success {
            warn!("Backend reported success but the session could not be resolved");
            return Classification::Retryable(LoginError::SessionUnresolved {
                user_id: user_id.clone(),
            });
        }

        Classification::Terminal(
            outcome
                .rejection
                .unwrap_or_else(|| Rejection::default_for(payload.kind())),
        )
    }

    /// Cache the failed operation, reusing the retry token when it is still ours
    fn track_failure(
        &self,
        user_id: &UserId,
        payload: OperationPayload,
        existing_token: Option<OperationToken>,
    ) -> OperationToken {
        let payload = match existing_token {
            Some(token) => {
                match self
                    .cache
                    .reinsert(PendingOperation::new(token, user_id.clone(), payload))
                {
                    Ok(()) => return token,
                    Err(record) => {
                        warn!(
                            %token,
                            "Retry token now belongs to another user, issuing a new one"
                        );
                        record.payload
                    }
                }
            }
            None => payload,
        };

        self.cache.insert_fresh(&self.tokens, |token| {
            PendingOperation::new(token, user_id.clone(), payload)
        })
    }

    async fn emit(&self, user_id: &UserId, outcome: NotificationOutcome) {
        if let Err(e) = self
            .notifier
            .notify(Notification::new(user_id.clone(), outcome))
            .await
        {
            warn!(error = %e, "Failed to deliver login notification");
        }
    }
}
