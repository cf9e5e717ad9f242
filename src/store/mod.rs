//! Shared ephemeral state visible to every worker process.
//!
//! The engine only needs a handful of key-value primitives: atomic
//! set-if-absent with a TTL for the resolution lock, compare-and-delete for its
//! release, additive hash increments for exposure and a set for distinct
//! bettors. A bet's updates are written as one unit so a failed write can be
//! retried without counting it twice. Any backend offering these can sit
//! behind [`SharedStore`].

pub mod memory;

pub use memory::MemoryStore;

use crate::errors::StoreError;
use crate::round::RoundKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Store `value` only if `key` is unset. Returns whether it was stored.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete `key` only while it still holds `expected`
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Add every `(field, delta)` to the hash at `key`, refreshing its TTL
    async fn hash_incr_many(
        &self,
        key: &str,
        increments: &[(String, f64)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, f64>, StoreError>;

    /// Returns true when `member` was newly added
    async fn set_add(&self, key: &str, member: &str, ttl: Option<Duration>)
        -> Result<bool, StoreError>;

    async fn set_len(&self, key: &str) -> Result<usize, StoreError>;

    /// Apply every write of one bet as a unit: all of it lands or none does
    async fn record_bet(&self, write: &BetWrite) -> Result<(), StoreError>;
}

/// The exposure, bettor and stats updates caused by a single bet
#[derive(Debug, Clone, PartialEq)]
pub struct BetWrite {
    pub exposure_key: String,
    pub exposure: Vec<(String, f64)>,
    pub bettors_key: String,
    pub bettor: String,
    pub stats_key: String,
    pub stats: Vec<(String, f64)>,
    pub ttl: Option<Duration>,
}

/// Key layout for per-round state
pub mod keys {
    use super::RoundKey;

    pub fn lock(round: &RoundKey) -> String {
        format!("lock:{}", round)
    }

    pub fn result(round: &RoundKey) -> String {
        format!("result:{}", round)
    }

    pub fn precomputed(round: &RoundKey) -> String {
        format!("precomputed:{}", round)
    }

    pub fn exposure(round: &RoundKey) -> String {
        format!("exposure:{}", round)
    }

    pub fn stats(round: &RoundKey) -> String {
        format!("stats:{}", round)
    }

    pub fn bettors(round: &RoundKey) -> String {
        format!("bettors:{}", round)
    }
}
