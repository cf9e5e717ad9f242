//! Exactly-once round resolution across racing worker processes.
//!
//! Every worker may call [`RoundResolutionCoordinator::resolve_round`] for the
//! same round at the same time. One of them wins the store lock, selects and
//! publishes the outcome; the others find the committed result, either
//! immediately or by polling while the winner works.

pub mod events;
pub mod lock;
pub mod retry;

pub use events::{
    InMemoryResultRepository, LoggingSettlement, Resolution, ResultRepository, RoundResolvedEvent,
    SettlementHook,
};
pub use lock::{LockGuard, ResolutionLock};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};

use crate::cache::TtlCache;
use crate::config::CoordinatorConfig;
use crate::errors::{ResolveError, StoreError};
use crate::fairness::VerificationHasher;
use crate::games::CombinationSpace;
use crate::ledger::{ExposureLedger, LiabilitySnapshot};
use crate::metrics::EngineMetrics;
use crate::protection::ProtectionPolicy;
use crate::round::{Clock, PeriodClock, RoundKey, RoundPhase};
use crate::selector::{self, OutcomeSelector, StrategyKind};
use crate::store::{keys, SharedStore};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Outcome decided ahead of time during the freeze window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedSelection {
    pub index: u32,
    pub liability: f64,
    pub strategy: Option<StrategyKind>,
    pub protection_applied: bool,
    /// Bets in the snapshot it was computed from
    pub bet_count: u64,
}

/// External collaborators of the coordinator
pub struct Collaborators {
    pub repository: Arc<dyn ResultRepository>,
    pub settlement: Arc<dyn SettlementHook>,
    pub hasher: Arc<dyn VerificationHasher>,
    pub period_clock: Arc<dyn PeriodClock>,
    pub clock: Arc<dyn Clock>,
    pub sleeper: Arc<dyn Sleeper>,
}

pub struct RoundResolutionCoordinator {
    process_id: String,
    config: CoordinatorConfig,
    ledger: Arc<ExposureLedger>,
    selector: Arc<OutcomeSelector>,
    protection: ProtectionPolicy,
    store: Arc<dyn SharedStore>,
    lock: ResolutionLock,
    collaborators: Collaborators,
    cache: TtlCache<RoundKey, Resolution>,
    poll_policy: RetryPolicy,
    store_retry: RetryPolicy,
    events: broadcast::Sender<RoundResolvedEvent>,
    metrics: Arc<EngineMetrics>,
}

impl RoundResolutionCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        ledger: Arc<ExposureLedger>,
        selector: Arc<OutcomeSelector>,
        protection: ProtectionPolicy,
        store: Arc<dyn SharedStore>,
        collaborators: Collaborators,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        let process_id = config.process_id();
        let lock = ResolutionLock::new(store.clone(), process_id.clone(), config.lock_ttl());
        let poll_policy = RetryPolicy::new(
            config.poll_attempts,
            Duration::from_millis(config.poll_initial_delay_ms),
            Duration::from_millis(config.poll_max_delay_ms),
        );
        let store_retry = RetryPolicy::new(
            config.store_retry_attempts,
            Duration::from_millis(config.store_retry_delay_ms),
            Duration::from_millis(config.store_retry_delay_ms.saturating_mul(8)),
        );
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let cache = TtlCache::new(config.cache_capacity, config.cache_ttl());

        Self {
            process_id,
            config,
            ledger,
            selector,
            protection,
            store,
            lock,
            collaborators,
            cache,
            poll_policy,
            store_retry,
            events,
            metrics,
        }
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn ledger(&self) -> &Arc<ExposureLedger> {
        &self.ledger
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundResolvedEvent> {
        self.events.subscribe()
    }

    /// Resolve `round` exactly once across all processes sharing the store
    pub async fn resolve_round(&self, round: &RoundKey) -> Result<Resolution, ResolveError> {
        if !self.collaborators.period_clock.has_ended(round) {
            return Err(ResolveError::RoundOpen(round.to_string()));
        }

        if let Some(resolution) = self.cache.get(round) {
            self.metrics.record_cache_hit();
            return Ok(resolution);
        }

        if let Some(resolution) = self.committed(round).await? {
            return Ok(self.finish(round, resolution));
        }

        // too late to publish anything new
        if self.is_archived(round) {
            tracing::warn!(round = %round, "Refusing to resolve archived round");
            return Err(ResolveError::Archived(round.to_string()));
        }

        let guard = match self.acquire(round).await? {
            Some(guard) => guard,
            None => {
                self.metrics.record_contention();
                tracing::debug!(round = %round, "Round locked elsewhere, polling for result");
                if let Some(resolution) = self.poll_committed(round).await? {
                    return Ok(self.finish(round, resolution));
                }
                // holder may have died and its lock expired
                match self.acquire(round).await? {
                    Some(guard) => guard,
                    None => {
                        return Err(ResolveError::Contention {
                            round: round.to_string(),
                            attempts: self.poll_policy.max_attempts,
                        })
                    }
                }
            }
        };

        let outcome = self.resolve_locked(round).await;

        let lock = &self.lock;
        let guard_ref = &guard;
        if let Err(e) = self
            .with_store_retry(move || lock.release(guard_ref))
            .await
        {
            tracing::warn!(round = %round, error = %e, "Failed to release resolution lock");
        }

        Ok(self.finish(round, outcome?))
    }

    /// Select ahead of time while the round is frozen
    pub async fn precompute_round(
        &self,
        round: &RoundKey,
    ) -> Result<Option<PrecomputedSelection>, ResolveError> {
        if !self.collaborators.period_clock.is_frozen(round) {
            tracing::debug!(round = %round, "Not in freeze window, skipping precompute");
            return Ok(None);
        }

        let space = self.space(round)?;
        let snapshot = Arc::new(self.snapshot(round).await?);
        let selection = self.compute(space, snapshot).await?;

        let payload = serde_json::to_string(&selection)?;
        let key = keys::precomputed(round);
        let (store, key_ref, payload_ref) = (&self.store, &key, &payload);
        let ttl = Some(self.config.precompute_ttl());
        self.with_store_retry(move || store.set(key_ref, payload_ref, ttl))
            .await?;

        self.metrics.record_precomputation();
        tracing::debug!(round = %round, index = selection.index, bets = selection.bet_count, "Selection precomputed");
        Ok(Some(selection))
    }

    pub async fn round_phase(&self, round: &RoundKey) -> Result<RoundPhase, ResolveError> {
        let clock = &self.collaborators.period_clock;
        if !clock.has_ended(round) {
            return Ok(if clock.is_frozen(round) {
                RoundPhase::Frozen
            } else {
                RoundPhase::Open
            });
        }

        if self.is_archived(round) {
            return Ok(RoundPhase::Archived);
        }
        if self.cache.get(round).is_some() || self.committed(round).await?.is_some() {
            return Ok(RoundPhase::Resolved);
        }
        Ok(RoundPhase::Frozen)
    }

    async fn resolve_locked(&self, round: &RoundKey) -> Result<Resolution, ResolveError> {
        if let Some(resolution) = self.committed(round).await? {
            return Ok(resolution);
        }

        let space = self.space(round)?;
        let snapshot = Arc::new(self.snapshot(round).await?);
        let selection = match self.take_precomputed(round, &snapshot).await {
            Some(selection) => selection,
            None => self.compute(space.clone(), snapshot.clone()).await?,
        };
        self.metrics.record_computation();

        let outcome = space.outcome(selection.index);
        let resolved_at = self.collaborators.clock.now();
        let resolution = Resolution {
            round: round.clone(),
            outcome: outcome.summary(),
            protection_applied: selection.protection_applied,
            strategy: selection.strategy,
            liability: selection.liability,
            verification_token: self.collaborators.hasher.token(round, &outcome, resolved_at),
            bet_count: snapshot.bet_count,
            resolved_at,
        };

        self.collaborators.repository.save(&resolution).await?;
        self.publish_to_store(&resolution).await?;
        self.metrics.record_resolution();

        if let Err(e) = self.collaborators.settlement.settle(&resolution).await {
            tracing::warn!(round = %round, error = %e, "Settlement hook failed");
        }

        // no subscribers is fine
        let _ = self.events.send(RoundResolvedEvent {
            resolution: resolution.clone(),
            resolved_by: self.process_id.clone(),
        });

        tracing::info!(
            round = %round,
            outcome = %outcome.label(),
            strategy = ?resolution.strategy,
            protection = resolution.protection_applied,
            liability = resolution.liability,
            bets = resolution.bet_count,
            "Round resolved"
        );
        Ok(resolution)
    }

    /// Protection, then the strategy plan, then a uniform draw
    async fn compute(
        &self,
        space: Arc<CombinationSpace>,
        snapshot: Arc<LiabilitySnapshot>,
    ) -> Result<PrecomputedSelection, ResolveError> {
        if let Some(decision) = self.protection.decide(&space, &snapshot) {
            self.metrics.record_protection();
            return Ok(PrecomputedSelection {
                index: decision.index,
                liability: decision.liability,
                strategy: None,
                protection_applied: true,
                bet_count: snapshot.bet_count,
            });
        }

        let selection = match self.selector.select(space.clone(), snapshot.clone()).await {
            Ok(selection) => selection,
            Err(e) => {
                self.metrics.record_fallback();
                tracing::warn!(
                    round = %snapshot.round,
                    error = %e,
                    "Every strategy failed, publishing a uniform random outcome"
                );
                selector::uniform_random(&space, &snapshot).ok_or(e)?
            }
        };

        Ok(PrecomputedSelection {
            index: selection.index,
            liability: selection.liability,
            strategy: Some(selection.strategy),
            protection_applied: false,
            bet_count: snapshot.bet_count,
        })
    }

    async fn take_precomputed(
        &self,
        round: &RoundKey,
        snapshot: &LiabilitySnapshot,
    ) -> Option<PrecomputedSelection> {
        let key = keys::precomputed(round);
        let raw = match self.store.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(round = %round, error = %e, "Could not read precomputed selection");
                return None;
            }
        };
        if let Err(e) = self.store.delete(&key).await {
            tracing::warn!(round = %round, error = %e, "Could not clear precomputed selection");
        }

        let selection: PrecomputedSelection = match serde_json::from_str(&raw) {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(round = %round, error = %e, "Discarding unreadable precomputed selection");
                return None;
            }
        };
        if selection.bet_count != snapshot.bet_count {
            tracing::debug!(
                round = %round,
                precomputed = selection.bet_count,
                current = snapshot.bet_count,
                "Precomputed selection is stale"
            );
            return None;
        }
        Some(selection)
    }

    /// Committed result from the store, else from the repository.
    ///
    /// The store copy expires with `result_ttl` while the repository keeps
    /// results for good, so a repository hit is written back to the store.
    async fn committed(&self, round: &RoundKey) -> Result<Option<Resolution>, ResolveError> {
        let key = keys::result(round);
        let (store, key_ref) = (&self.store, &key);
        if let Some(raw) = self.with_store_retry(move || store.get(key_ref)).await? {
            return Ok(Some(serde_json::from_str(&raw)?));
        }

        let Some(resolution) = self.collaborators.repository.find(round).await? else {
            return Ok(None);
        };
        tracing::debug!(round = %round, "Committed result found in repository");
        if let Err(e) = self.publish_to_store(&resolution).await {
            tracing::warn!(round = %round, error = %e, "Could not restore result to store");
        }
        Ok(Some(resolution))
    }

    async fn publish_to_store(&self, resolution: &Resolution) -> Result<(), ResolveError> {
        let payload = serde_json::to_string(resolution)?;
        let key = keys::result(&resolution.round);
        let (store, key_ref, payload_ref) = (&self.store, &key, &payload);
        let ttl = Some(self.config.result_ttl());
        self.with_store_retry(move || store.set(key_ref, payload_ref, ttl))
            .await?;
        Ok(())
    }

    /// Cache a resolution and drop per-round state no longer needed
    fn finish(&self, round: &RoundKey, resolution: Resolution) -> Resolution {
        self.cache.put(round.clone(), resolution.clone());
        self.ledger.index().remove(round);
        resolution
    }

    fn is_archived(&self, round: &RoundKey) -> bool {
        self.collaborators
            .period_clock
            .ended_for(round)
            .is_some_and(|elapsed| elapsed > self.config.result_ttl())
    }

    async fn poll_committed(&self, round: &RoundKey) -> Result<Option<Resolution>, ResolveError> {
        self.poll_policy
            .poll(self.collaborators.sleeper.as_ref(), move || async move {
                match self.committed(round).await {
                    Err(ResolveError::Store(e)) if e.is_transient() => {
                        tracing::warn!(round = %round, error = %e, "Store unavailable while polling");
                        Ok(None)
                    }
                    other => other,
                }
            })
            .await
    }

    async fn acquire(&self, round: &RoundKey) -> Result<Option<LockGuard>, StoreError> {
        let lock = &self.lock;
        self.with_store_retry(move || lock.try_acquire(round)).await
    }

    async fn snapshot(&self, round: &RoundKey) -> Result<LiabilitySnapshot, StoreError> {
        let ledger = &self.ledger;
        self.with_store_retry(move || ledger.snapshot(round)).await
    }

    fn space(&self, round: &RoundKey) -> Result<Arc<CombinationSpace>, ResolveError> {
        self.ledger
            .spaces()
            .get(round.game)
            .ok_or(ResolveError::UnknownGame(round.game))
    }

    async fn with_store_retry<T, F, Fut>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.store_retry
            .retry(self.collaborators.sleeper.as_ref(), op, StoreError::is_transient)
            .await
    }
}
