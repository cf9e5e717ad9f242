//! Incremental order-statistics index over outcome liabilities.
//!
//! Liabilities are kept as integer micro-units so the ordering is total and
//! exact. The index counts the bets it has absorbed; a reader compares that
//! count with a snapshot's before trusting it.

use crate::round::RoundKey;
use dashmap::DashMap;
use rand::Rng;
use std::collections::BTreeSet;

const MICRO: f64 = 1_000_000.0;

fn to_micro(liability: f64) -> u64 {
    (liability * MICRO).round().max(0.0) as u64
}

#[derive(Debug, Clone)]
pub struct LiabilityIndex {
    liabilities: Vec<u64>,
    order: BTreeSet<(u64, u32)>,
    bets_seen: u64,
}

impl LiabilityIndex {
    pub fn new(space_size: u32) -> Self {
        Self {
            liabilities: vec![0; space_size as usize],
            order: (0..space_size).map(|i| (0, i)).collect(),
            bets_seen: 0,
        }
    }

    /// Absorb one bet's per-outcome increments
    pub fn apply(&mut self, increments: &[(u32, f64)]) {
        for (index, delta) in increments {
            let Some(slot) = self.liabilities.get_mut(*index as usize) else {
                continue;
            };
            self.order.remove(&(*slot, *index));
            *slot += to_micro(*delta);
            self.order.insert((*slot, *index));
        }
        self.bets_seen += 1;
    }

    pub fn bets_seen(&self) -> u64 {
        self.bets_seen
    }

    pub fn liability(&self, index: u32) -> f64 {
        self.liabilities
            .get(index as usize)
            .map(|m| *m as f64 / MICRO)
            .unwrap_or(0.0)
    }

    /// All outcomes sharing the minimum liability
    pub fn minimal_set(&self) -> Vec<u32> {
        let Some(&(min, _)) = self.order.iter().next() else {
            return Vec::new();
        };
        self.order
            .range((min, 0)..=(min, u32::MAX))
            .map(|(_, index)| *index)
            .collect()
    }

    /// Uniform choice among the minimal outcomes
    pub fn pick_minimum<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<(u32, f64)> {
        let minimal = self.minimal_set();
        if minimal.is_empty() {
            return None;
        }
        let index = minimal[rng.gen_range(0..minimal.len())];
        Some((index, self.liability(index)))
    }
}

/// Per-round indexes for this process
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: DashMap<RoundKey, LiabilityIndex>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, round: &RoundKey, space_size: u32, increments: &[(u32, f64)]) {
        self.indexes
            .entry(round.clone())
            .or_insert_with(|| LiabilityIndex::new(space_size))
            .apply(increments);
    }

    /// Minimum from the index, only when it has seen exactly `expected_bets`
    pub fn consistent_minimum<R: Rng + ?Sized>(
        &self,
        round: &RoundKey,
        expected_bets: u64,
        rng: &mut R,
    ) -> Option<(u32, f64)> {
        let index = self.indexes.get(round)?;
        if index.bets_seen() != expected_bets {
            tracing::debug!(
                round = %round,
                seen = index.bets_seen(),
                expected = expected_bets,
                "Incremental index out of step with snapshot"
            );
            return None;
        }
        index.pick_minimum(rng)
    }

    pub fn remove(&self, round: &RoundKey) {
        self.indexes.remove(round);
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameType;
    use rand::SeedableRng;

    #[test]
    fn test_minimal_set_tracks_updates() {
        let mut index = LiabilityIndex::new(4);
        assert_eq!(index.minimal_set(), vec![0, 1, 2, 3]);

        index.apply(&[(0, 10.0), (1, 5.0)]);
        assert_eq!(index.minimal_set(), vec![2, 3]);

        index.apply(&[(2, 1.0), (3, 1.0)]);
        assert_eq!(index.minimal_set(), vec![2, 3]);
        assert_eq!(index.bets_seen(), 2);
        assert!((index.liability(0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_registry_requires_matching_bet_count() {
        let registry = IndexRegistry::new();
        let round = RoundKey::new(GameType::Wingo, 30, "202403150001", "default");
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);

        registry.record(&round, 10, &[(3, 18.0)]);
        assert!(registry.consistent_minimum(&round, 2, &mut rng).is_none());

        let (index, liability) = registry.consistent_minimum(&round, 1, &mut rng).unwrap();
        assert_ne!(index, 3);
        assert_eq!(liability, 0.0);

        registry.remove(&round);
        assert!(registry.is_empty());
    }
}
