use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of the chat user who requested an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Small integer handed to the user so they can ask for a failed operation to be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationToken(u32);

impl OperationToken {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of credential submission that can be retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    PasswordLogin,
    SecondFactor,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::PasswordLogin => write!(f, "password login"),
            OperationKind::SecondFactor => write!(f, "second factor code"),
        }
    }
}

/// Kind-specific parameters of a submission.
///
/// The payload is kept verbatim, secrets included, for as long as the operation sits in
/// the failed-operation cache so the user never has to re-enter credentials to retry.
/// `Debug` redacts the secrets.
#[derive(Clone, PartialEq, Eq)]
pub enum OperationPayload {
    PasswordLogin { username: String, password: String },
    SecondFactor { code: String },
}

impl OperationPayload {
    pub fn password_login(username: impl Into<String>, password: impl Into<String>) -> Self {
        OperationPayload::PasswordLogin {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn second_factor(code: impl Into<String>) -> Self {
        OperationPayload::SecondFactor { code: code.into() }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            OperationPayload::PasswordLogin { .. } => OperationKind::PasswordLogin,
            OperationPayload::SecondFactor { .. } => OperationKind::SecondFactor,
        }
    }
}

impl fmt::Debug for OperationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationPayload::PasswordLogin { username, .. } => f
                .debug_struct("PasswordLogin")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            OperationPayload::SecondFactor { .. } => f
                .debug_struct("SecondFactor")
                .field("code", &"<redacted>")
                .finish(),
        }
    }
}

/// A failed operation waiting in the cache for the user to retry it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Token the user retries with, unique among cached entries
    pub token: OperationToken,
    /// User who started the operation
    pub user_id: UserId,
    /// Time of insertion, refreshed on every repeated failure
    pub created_at: DateTime<Utc>,
    /// Parameters needed to submit the operation again
    pub payload: OperationPayload,
}

impl PendingOperation {
    /// Create a record stamped with the current time
    pub fn new(token: OperationToken, user_id: UserId, payload: OperationPayload) -> Self {
        Self::stamped(token, user_id, payload, Utc::now())
    }

    pub fn stamped(
        token: OperationToken,
        user_id: UserId,
        payload: OperationPayload,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            user_id,
            created_at,
            payload,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.payload.kind()
    }

    /// Whether the record has reached `timeout` age at `now`
    pub fn is_expired_at(&self, timeout: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at >= timeout
    }
}
