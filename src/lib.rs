//! Retry/resume state machine for credential submissions made through a chat bot.
//!
//! Password logins and second-factor codes are pushed to a serialized auth queue. When
//! an attempt fails transiently the operation is parked in an in-memory cache under a
//! small random token that the user can later retry with, until a periodic sweep evicts
//! it.

pub mod auth;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod notification;
pub mod operation;
pub mod orchestrator;
pub mod service;

pub use auth::{
    AuthQueue, LoginOutcome, PollToken, QueueResult, QueueStatus, Rejection, Session,
    SessionResolver,
};
pub use cache::{FailedOperationCache, Sweeper, TokenGenerator};
pub use config::RelayConfig;
pub use dispatcher::{RetryDispatcher, RetryOutcome};
pub use error::{ConfigError, ConfigResult, LoginError};
pub use notification::{BroadcastNotifier, Notification, NotificationOutcome, NotificationSink};
pub use operation::{OperationKind, OperationPayload, OperationToken, PendingOperation, UserId};
pub use orchestrator::{LoginOrchestrator, LoginState};
pub use service::LoginRelay;
