use serde::{Deserialize, Serialize};

use crate::operation::UserId;

/// A logged-in user session as known to the credential store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    /// Account name shown back to the user on success
    pub username: String,
}

/// Looks up the session that a successful login should have produced
pub trait SessionResolver: Send + Sync {
    fn resolve_session(&self, user_id: &UserId) -> Option<Session>;
}
