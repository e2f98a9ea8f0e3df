use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::auth::{AuthQueue, SessionResolver};
use crate::cache::{FailedOperationCache, Sweeper, TokenGenerator};
use crate::config::RelayConfig;
use crate::error::ConfigResult;
use crate::dispatcher::{RetryDispatcher, RetryOutcome};
use crate::notification::NotificationSink;
use crate::operation::{OperationPayload, OperationToken, UserId};
use crate::orchestrator::{LoginOrchestrator, LoginState};

/// Entry point for the surrounding chat bot.
///
/// Owns the single failed-operation cache for the process and wires it into the
/// orchestrator, the retry dispatcher and the periodic sweeper. Create one at startup and
/// call [`shutdown`](Self::shutdown) before exit.
///
/// Construction fails with [`ConfigError::Invalid`](crate::error::ConfigError::Invalid)
/// when `config` doesn't pass [`RelayConfig::validate`].
pub struct LoginRelay {
    cache: FailedOperationCache,
    orchestrator: Arc<LoginOrchestrator>,
    dispatcher: RetryDispatcher,
    sweeper: Sweeper,
}

impl LoginRelay {
    pub fn new(
        config: &RelayConfig,
        queue: Arc<dyn AuthQueue>,
        sessions: Arc<dyn SessionResolver>,
        notifier: Arc<dyn NotificationSink>,
    ) -> ConfigResult<Self> {
        config.validate()?;

        let cache = FailedOperationCache::new();

        let orchestrator = Arc::new(LoginOrchestrator::new(
            queue,
            sessions,
            Arc::clone(&notifier),
            cache.clone(),
            TokenGenerator::new(config.token_space),
            config.poll_interval(),
        ));
        let dispatcher = RetryDispatcher::new(cache.clone(), Arc::clone(&orchestrator), notifier);
        let sweeper = Sweeper::new(
            cache.clone(),
            config.retry_timeout(),
            config.sweep_interval(),
        );

        Ok(Self {
            cache,
            orchestrator,
            dispatcher,
            sweeper,
        })
    }

    /// Run a first attempt, or a retry when `existing_token` is given
    pub async fn submit_and_track(
        &self,
        user_id: &UserId,
        payload: OperationPayload,
        existing_token: Option<OperationToken>,
    ) -> LoginState {
        self.orchestrator
            .submit_and_track(user_id, payload, existing_token)
            .await
    }

    /// Called when `user_id` activates the retry affordance bound to `token`
    pub async fn retry(&self, user_id: &UserId, token: OperationToken) -> RetryOutcome {
        self.dispatcher.retry(user_id, token).await
    }

    /// Evict failed operations older than the configured retry timeout
    pub fn sweep_now(&self) -> usize {
        self.sweeper.sweep_now()
    }

    pub async fn start_sweeper(&self) -> Result<()> {
        self.sweeper.start().await
    }

    /// Stop background work. Cached operations are dropped with the relay.
    pub async fn shutdown(&self) -> Result<()> {
        if self.sweeper.is_running().await {
            self.sweeper.stop().await?;
        }
        info!(pending = self.cache.len(), "Login relay shut down");
        Ok(())
    }

    pub fn cache(&self) -> &FailedOperationCache {
        &self.cache
    }
}
