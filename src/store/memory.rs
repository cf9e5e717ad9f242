//! In-process [`SharedStore`] backed by `DashMap`.
//!
//! Every worker task sharing an `Arc<MemoryStore>` sees the same state, which
//! is enough to run several coordinators against one round in tests and in the
//! simulator. Expired entries are purged lazily on access.

use super::{BetWrite, SharedStore};
use crate::errors::StoreError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Hash(HashMap<String, f64>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }
}

fn wrong_type(key: &str, wanted: &str) -> StoreError {
    StoreError::Corrupted {
        key: key.to_string(),
        reason: format!("value is not a {}", wanted),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Slot>,
    injected_failures: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` operations fail with `StoreError::Unavailable`
    pub fn fail_next(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Expire `key` immediately, as if its TTL ran out
    pub fn force_expire(&self, key: &str) {
        if let Some(mut slot) = self.entries.get_mut(key) {
            slot.expires_at = Some(Instant::now());
        }
    }

    /// Remaining TTL of a live key
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let slot = self.entries.get(key)?;
        let at = slot.expires_at?;
        at.checked_duration_since(Instant::now())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.purge_expired(key);
        self.entries.contains_key(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        let injected = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match injected {
            Ok(_) => Err(StoreError::Unavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }

    fn purge_expired(&self, key: &str) {
        let now = Instant::now();
        self.entries.remove_if(key, |_, slot| slot.is_expired(now));
    }

    fn begin(&self, key: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.purge_expired(key);
        Ok(())
    }

    fn expect_kind(&self, key: &str, wanted: &str, is_kind: fn(&Value) -> bool) -> Result<(), StoreError> {
        match self.entries.get(key) {
            Some(slot) if !is_kind(&slot.value) => Err(wrong_type(key, wanted)),
            _ => Ok(()),
        }
    }

    fn incr_fields(
        &self,
        key: &str,
        increments: &[(String, f64)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(Value::Hash(HashMap::new()), None));
        match &mut slot.value {
            Value::Hash(fields) => {
                for (field, delta) in increments {
                    *fields.entry(field.clone()).or_insert(0.0) += delta;
                }
            }
            _ => return Err(wrong_type(key, "hash")),
        }
        if let Some(ttl) = ttl {
            slot.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    fn add_member(&self, key: &str, member: &str, ttl: Option<Duration>) -> Result<bool, StoreError> {
        let mut slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(Value::Set(HashSet::new()), None));
        let added = match &mut slot.value {
            Value::Set(members) => members.insert(member.to_string()),
            _ => return Err(wrong_type(key, "set")),
        };
        if let Some(ttl) = ttl {
            slot.expires_at = Some(Instant::now() + ttl);
        }
        Ok(added)
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.begin(key)?;
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::new(Value::Text(value.to_string()), Some(ttl)));
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.begin(key)?;
        match self.entries.get(key) {
            None => Ok(None),
            Some(slot) => match &slot.value {
                Value::Text(text) => Ok(Some(text.clone())),
                _ => Err(wrong_type(key, "string")),
            },
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries
            .insert(key.to_string(), Slot::new(Value::Text(value.to_string()), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.begin(key)?;
        Ok(self.entries.remove(key).is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.begin(key)?;
        let removed = self.entries.remove_if(key, |_, slot| {
            matches!(&slot.value, Value::Text(current) if current == expected)
        });
        Ok(removed.is_some())
    }

    async fn hash_incr_many(
        &self,
        key: &str,
        increments: &[(String, f64)],
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.begin(key)?;
        self.incr_fields(key, increments, ttl)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, f64>, StoreError> {
        self.begin(key)?;
        match self.entries.get(key) {
            None => Ok(HashMap::new()),
            Some(slot) => match &slot.value {
                Value::Hash(fields) => Ok(fields.clone()),
                _ => Err(wrong_type(key, "hash")),
            },
        }
    }

    async fn set_add(
        &self,
        key: &str,
        member: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        self.begin(key)?;
        self.add_member(key, member, ttl)
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        self.begin(key)?;
        match self.entries.get(key) {
            None => Ok(0),
            Some(slot) => match &slot.value {
                Value::Set(members) => Ok(members.len()),
                _ => Err(wrong_type(key, "set")),
            },
        }
    }

    async fn record_bet(&self, write: &BetWrite) -> Result<(), StoreError> {
        self.check_available()?;
        for key in [&write.exposure_key, &write.stats_key, &write.bettors_key] {
            self.purge_expired(key);
        }
        // type checks first so a bad key leaves nothing half written
        self.expect_kind(&write.exposure_key, "hash", |v| matches!(v, Value::Hash(_)))?;
        self.expect_kind(&write.stats_key, "hash", |v| matches!(v, Value::Hash(_)))?;
        self.expect_kind(&write.bettors_key, "set", |v| matches!(v, Value::Set(_)))?;

        if !write.exposure.is_empty() {
            self.incr_fields(&write.exposure_key, &write.exposure, write.ttl)?;
        }
        self.add_member(&write.bettors_key, &write.bettor, write.ttl)?;
        self.incr_fields(&write.stats_key, &write.stats, write.ttl)?;
        Ok(())
    }
}
