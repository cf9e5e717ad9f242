//! Per-round resolution lock on the shared store.
//!
//! Acquire is an atomic set-if-absent with a TTL; release only deletes the key
//! while it still holds our token, so an expired holder can never free a lock
//! that another process has since taken.

use crate::errors::StoreError;
use crate::round::RoundKey;
use crate::store::{keys, SharedStore};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Proof of ownership of one round's lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockGuard {
    pub key: String,
    pub token: String,
}

pub struct ResolutionLock {
    store: Arc<dyn SharedStore>,
    process_id: String,
    ttl: Duration,
}

impl ResolutionLock {
    pub fn new(store: Arc<dyn SharedStore>, process_id: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            process_id: process_id.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn new_token(&self) -> String {
        format!("{}:{}", self.process_id, Uuid::new_v4())
    }

    pub async fn try_acquire(&self, round: &RoundKey) -> Result<Option<LockGuard>, StoreError> {
        let key = keys::lock(round);
        let token = self.new_token();
        if self.store.set_if_absent(&key, &token, self.ttl).await? {
            tracing::debug!(round = %round, token = %token, "Resolution lock acquired");
            Ok(Some(LockGuard { key, token }))
        } else {
            Ok(None)
        }
    }

    /// Compare-and-delete; false when the lock had already expired or changed hands
    pub async fn release(&self, guard: &LockGuard) -> Result<bool, StoreError> {
        let released = self.store.delete_if_equals(&guard.key, &guard.token).await?;
        if !released {
            tracing::warn!(key = %guard.key, "Lock was no longer ours at release");
        }
        Ok(released)
    }
}
