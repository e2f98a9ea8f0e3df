use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use login_relay::{
    AuthQueue, BroadcastNotifier, LoginOutcome, LoginRelay, OperationPayload, PollToken,
    QueueResult, QueueStatus, RelayConfig, RetryOutcome, Session, SessionResolver, UserId,
};

/// Number of status checks a queued item stays pending in the simulation
const SIMULATED_QUEUE_DELAY_POLLS: usize = 2;

/// In-process stand-in for the auth backend.
///
/// The first submission fails with a transient error; later ones are queued and succeed
/// after a couple of status checks, creating a session for the user.
struct SimulatedQueue {
    submissions: AtomicUsize,
    next_poll_token: AtomicU64,
    queued: DashMap<PollToken, (UserId, String, usize)>,
    sessions: Arc<DashMap<UserId, Session>>,
}

impl SimulatedQueue {
    fn new(sessions: Arc<DashMap<UserId, Session>>) -> Self {
        Self {
            submissions: AtomicUsize::new(0),
            next_poll_token: AtomicU64::new(1),
            queued: DashMap::new(),
            sessions,
        }
    }
}

#[async_trait]
impl AuthQueue for SimulatedQueue {
    async fn submit_password_login(
        &self,
        user_id: &UserId,
        username: &str,
        _password: &str,
    ) -> Result<QueueResult> {
        if self.submissions.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(QueueResult::Completed(LoginOutcome::errored("timeout")));
        }

        let poll_token = PollToken::new(self.next_poll_token.fetch_add(1, Ordering::SeqCst));
        self.queued
            .insert(poll_token, (user_id.clone(), username.to_string(), 0));
        Ok(QueueResult::Queued { poll_token })
    }

    async fn submit_second_factor(&self, _user_id: &UserId, _code: &str) -> Result<QueueResult> {
        Ok(QueueResult::Completed(LoginOutcome::rejected(None)))
    }

    fn poll_status(&self, poll_token: PollToken) -> QueueStatus {
        let Some(mut item) = self.queued.get_mut(&poll_token) else {
            return QueueStatus::Processed(LoginOutcome::errored("unknown queue item"));
        };

        item.2 += 1;
        if item.2 <= SIMULATED_QUEUE_DELAY_POLLS {
            return QueueStatus::Pending;
        }

        let (user_id, username, _) = item.clone();
        drop(item);
        self.queued.remove(&poll_token);
        self.sessions
            .insert(user_id.clone(), Session { user_id, username });
        QueueStatus::Processed(LoginOutcome::succeeded())
    }
}

struct SimulatedSessions(Arc<DashMap<UserId, Session>>);

impl SessionResolver for SimulatedSessions {
    fn resolve_session(&self, user_id: &UserId) -> Option<Session> {
        self.0.get(user_id).map(|session| session.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    // Initialize the tracing subscriber for structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "login_relay=debug,warn".into()
            } else {
                "login_relay=info,warn".into()
            }
        }))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    info!("Login relay demo starting");

    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    let config_path =
        std::env::var("LOGIN_RELAY_CONFIG").unwrap_or_else(|_| "login-relay.json".to_string());
    let config = RelayConfig::load(&config_path).await?;

    let sessions = Arc::new(DashMap::new());
    let notifier = Arc::new(BroadcastNotifier::default());
    let relay = LoginRelay::new(
        &config,
        Arc::new(SimulatedQueue::new(Arc::clone(&sessions))),
        Arc::new(SimulatedSessions(sessions)),
        notifier.clone(),
    )?;
    relay.start_sweeper().await?;

    let mut notifications = notifier.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(notification) = notifications.recv().await {
            match serde_json::to_string(&notification) {
                Ok(json) => println!("{}", json),
                Err(e) => debug!(error = %e, "Failed to render notification"),
            }
        }
    });

    let user = UserId::from("demo-user");
    let state = relay
        .submit_and_track(
            &user,
            OperationPayload::password_login("demo", "correct horse"),
            None,
        )
        .await;

    if let Some(token) = state.retry_token() {
        info!(%token, "First attempt failed, retrying");
        if let RetryOutcome::Dispatched(state) = relay.retry(&user, token).await {
            info!(?state, "Retry finished");
        }
    }

    relay.shutdown().await?;
    drop(relay);
    drop(notifier);
    let _ = printer.await;

    Ok(())
}
