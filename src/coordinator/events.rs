//! Published results and the collaborators that receive them.

use crate::errors::ResolveError;
use crate::games::OutcomeSummary;
use crate::round::RoundKey;
use crate::selector::StrategyKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Final, published decision for a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub round: RoundKey,
    pub outcome: OutcomeSummary,
    pub protection_applied: bool,
    /// Selector strategy that chose the outcome; `None` when protection did
    pub strategy: Option<StrategyKind>,
    pub liability: f64,
    pub verification_token: String,
    pub bet_count: u64,
    pub resolved_at: DateTime<Utc>,
}

/// Broadcast once per round by the process that resolved it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResolvedEvent {
    pub resolution: Resolution,
    pub resolved_by: String,
}

/// Durable storage of published results
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn save(&self, resolution: &Resolution) -> Result<(), ResolveError>;

    async fn find(&self, round: &RoundKey) -> Result<Option<Resolution>, ResolveError>;
}

/// Winner determination and payouts, run after the result is committed
#[async_trait]
pub trait SettlementHook: Send + Sync {
    async fn settle(&self, resolution: &Resolution) -> Result<(), String>;
}

/// Process-local repository; the first save for a round wins
#[derive(Debug, Default)]
pub struct InMemoryResultRepository {
    results: DashMap<RoundKey, Resolution>,
    saves: AtomicU64,
    fail_saves: AtomicBool,
}

impl InMemoryResultRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Make every subsequent save fail
    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResultRepository for InMemoryResultRepository {
    async fn save(&self, resolution: &Resolution) -> Result<(), ResolveError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ResolveError::Persistence("repository unavailable".to_string()));
        }
        self.results
            .entry(resolution.round.clone())
            .or_insert_with(|| resolution.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn find(&self, round: &RoundKey) -> Result<Option<Resolution>, ResolveError> {
        Ok(self.results.get(round).map(|r| r.clone()))
    }
}

/// Settlement hook that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSettlement;

#[async_trait]
impl SettlementHook for LoggingSettlement {
    async fn settle(&self, resolution: &Resolution) -> Result<(), String> {
        tracing::info!(
            round = %resolution.round,
            outcome = ?resolution.outcome.values,
            liability = resolution.liability,
            "Settlement requested"
        );
        Ok(())
    }
}
