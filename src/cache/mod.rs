//! In-memory store of failed operations awaiting a user retry.
//!
//! The cache is a thin handle around a `DashMap` keyed by [`OperationToken`]. Clones share
//! the same storage, so one instance is created at startup and handed to the orchestrator,
//! the dispatcher and the sweeper. Nothing is persisted: a restart starts from empty.

pub mod sweeper;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::operation::{OperationToken, PendingOperation, UserId};

pub use sweeper::Sweeper;
pub use token::TokenGenerator;

/// Process-wide map from retry token to the failed operation it identifies
#[derive(Clone, Default)]
pub struct FailedOperationCache {
    inner: Arc<DashMap<OperationToken, PendingOperation>>,
}

impl FailedOperationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached operations
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, token: OperationToken) -> bool {
        self.inner.contains_key(&token)
    }

    /// Add or overwrite the entry for `record.token`, returning the previous record if any.
    ///
    /// Overwriting is last-write-wins; callers must only pass tokens obtained from
    /// [`insert_fresh`](Self::insert_fresh) or from a previous cache hit.
    pub fn insert(&self, record: PendingOperation) -> Option<PendingOperation> {
        trace!(token = %record.token, kind = %record.kind(), "Caching failed operation");
        self.inner.insert(record.token, record)
    }

    /// Claim an unused token from `generator` and store the record built for it.
    ///
    /// The vacancy check and the insert happen under the same shard lock, so two callers
    /// racing on a multi-threaded runtime can never end up sharing a token.
    pub fn insert_fresh<F>(&self, generator: &TokenGenerator, build: F) -> OperationToken
    where
        F: FnOnce(OperationToken) -> PendingOperation,
    {
        loop {
            let candidate = generator.generate(self);
            match self.inner.entry(candidate) {
                Entry::Vacant(slot) => {
                    let record = build(candidate);
                    trace!(
                        token = %candidate,
                        kind = %record.kind(),
                        "Caching failed operation under fresh token"
                    );
                    slot.insert(record);
                    return candidate;
                }
                // Another task claimed it between generation and insertion
                Entry::Occupied(_) => continue,
            }
        }
    }

    /// Store `record` under its existing token unless the token now belongs to another user.
    ///
    /// A retry keeps its token across failures, but the sweep can evict the entry while the
    /// retry is still waiting in the queue and the token can then be handed to someone else.
    /// In that case the record is given back untouched in `Err`.
    pub fn reinsert(&self, record: PendingOperation) -> Result<(), PendingOperation> {
        match self.inner.entry(record.token) {
            Entry::Occupied(slot) if slot.get().user_id != record.user_id => {
                debug!(token = %record.token, "Retry token was reassigned after expiry");
                Err(record)
            }
            Entry::Occupied(mut slot) => {
                trace!(
                    token = %record.token,
                    kind = %record.kind(),
                    "Refreshing failed operation"
                );
                slot.insert(record);
                Ok(())
            }
            Entry::Vacant(slot) => {
                trace!(
                    token = %record.token,
                    kind = %record.kind(),
                    "Reinstating failed operation"
                );
                slot.insert(record);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, token: OperationToken) -> Option<PendingOperation> {
        self.inner.get(&token).map(|entry| entry.value().clone())
    }

    /// Remove the entry for `token`. A missing token is a no-op.
    pub fn remove(&self, token: OperationToken) -> Option<PendingOperation> {
        let removed = self.inner.remove(&token).map(|(_, record)| record);
        if removed.is_some() {
            trace!(%token, "Removed failed operation from cache");
        }
        removed
    }

    /// Remove the entry for `token` only if it still belongs to `owner`
    pub fn remove_owned(
        &self,
        token: OperationToken,
        owner: &UserId,
    ) -> Option<PendingOperation> {
        let removed = self
            .inner
            .remove_if(&token, |_, record| &record.user_id == owner)
            .map(|(_, record)| record);
        if removed.is_some() {
            trace!(%token, "Removed failed operation from cache");
        }
        removed
    }

    /// Evict every entry that is at least `timeout` old, returning how many were removed
    pub fn sweep(&self, timeout: Duration) -> usize {
        self.sweep_at(timeout, Utc::now())
    }

    /// Same as [`sweep`](Self::sweep) against an explicit clock reading
    pub fn sweep_at(&self, timeout: Duration, now: DateTime<Utc>) -> usize {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let mut removed = 0usize;
        self.inner.retain(|_, record| {
            let keep = !record.is_expired_at(timeout, now);
            if !keep {
                removed += 1;
            }
            keep
        });

        if removed > 0 {
            debug!(
                removed,
                remaining = self.inner.len(),
                "Swept expired failed operations"
            );
        }
        removed
    }

    /// Tokens currently held by the cache
    pub fn tokens(&self) -> Vec<OperationToken> {
        self.inner.iter().map(|entry| *entry.key()).collect()
    }
}
