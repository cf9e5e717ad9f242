//! Engine counters

use crate::selector::StrategyKind;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct EngineMetrics {
    start_time: Instant,
    bets_recorded: AtomicU64,
    bets_skipped: AtomicU64,
    computations: AtomicU64,
    rounds_resolved: AtomicU64,
    cache_hits: AtomicU64,
    lock_contentions: AtomicU64,
    protection_applied: AtomicU64,
    fallbacks: AtomicU64,
    strategy_failures: AtomicU64,
    precomputations: AtomicU64,
    strategy_uses: [AtomicU64; StrategyKind::COUNT],
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            bets_recorded: AtomicU64::new(0),
            bets_skipped: AtomicU64::new(0),
            computations: AtomicU64::new(0),
            rounds_resolved: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            lock_contentions: AtomicU64::new(0),
            protection_applied: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            strategy_failures: AtomicU64::new(0),
            precomputations: AtomicU64::new(0),
            strategy_uses: Default::default(),
        }
    }

    pub fn record_bet(&self) {
        self.bets_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_bet(&self) {
        self.bets_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// One full selection run under the resolution lock
    pub fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_resolution(&self) {
        self.rounds_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_contention(&self) {
        self.lock_contentions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_protection(&self) {
        self.protection_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_strategy_failure(&self) {
        self.strategy_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_precomputation(&self) {
        self.precomputations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_strategy(&self, kind: StrategyKind) {
        self.strategy_uses[kind.ordinal()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            bets_recorded: self.bets_recorded.load(Ordering::Relaxed),
            bets_skipped: self.bets_skipped.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::SeqCst),
            rounds_resolved: self.rounds_resolved.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            lock_contentions: self.lock_contentions.load(Ordering::Relaxed),
            protection_applied: self.protection_applied.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            strategy_failures: self.strategy_failures.load(Ordering::Relaxed),
            precomputations: self.precomputations.load(Ordering::Relaxed),
            strategy_uses: StrategyKind::ALL
                .iter()
                .map(|kind| (kind.to_string(), self.strategy_uses[kind.ordinal()].load(Ordering::Relaxed)))
                .filter(|(_, count)| *count > 0)
                .collect(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub bets_recorded: u64,
    pub bets_skipped: u64,
    pub computations: u64,
    pub rounds_resolved: u64,
    pub cache_hits: u64,
    pub lock_contentions: u64,
    pub protection_applied: u64,
    pub fallbacks: u64,
    pub strategy_failures: u64,
    pub precomputations: u64,
    pub strategy_uses: Vec<(String, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = EngineMetrics::new();
        metrics.record_bet();
        metrics.record_bet();
        metrics.record_skipped_bet();
        metrics.record_computation();
        metrics.record_strategy(StrategyKind::FullScan);
        metrics.record_strategy(StrategyKind::FullScan);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.bets_recorded, 2);
        assert_eq!(snapshot.bets_skipped, 1);
        assert_eq!(snapshot.computations, 1);
        assert_eq!(snapshot.strategy_uses, vec![("full_scan".to_string(), 2)]);
    }
}
