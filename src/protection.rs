//! Low-liquidity protection.
//!
//! With very few distinct bettors a round is steered to an outcome that pays
//! nothing when one exists. Small spaces are scanned outright; large spaces
//! are searched in bounded batches, starting with outcomes that lose the
//! heavier side of every complementary pair.

use crate::config::ProtectionConfig;
use crate::games::{BetKey, CombinationSpace};
use crate::ledger::LiabilitySnapshot;
use crate::selector::scan::{liabilities_equal, scan, MinTracker, LIABILITY_EPSILON};
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectionDecision {
    pub index: u32,
    pub liability: f64,
    /// Candidate batches scanned; 1 for a full scan of a small space
    pub batches: usize,
}

impl ProtectionDecision {
    pub fn is_zero_liability(&self) -> bool {
        self.liability.abs() <= LIABILITY_EPSILON
    }
}

#[derive(Debug, Clone)]
pub struct ProtectionPolicy {
    config: ProtectionConfig,
}

impl ProtectionPolicy {
    pub fn new(config: ProtectionConfig) -> Self {
        Self { config }
    }

    pub fn applies(&self, snapshot: &LiabilitySnapshot) -> bool {
        self.config.enabled
            && snapshot.distinct_bettors >= 1
            && snapshot.distinct_bettors < self.config.min_distinct_bettors
    }

    /// Protected outcome, or `None` when the policy does not apply or finds nothing
    pub fn decide(&self, space: &CombinationSpace, snapshot: &LiabilitySnapshot) -> Option<ProtectionDecision> {
        if !self.applies(snapshot) {
            return None;
        }
        let mut rng = rand::thread_rng();

        let decision = if space.is_large() {
            self.search_batches(space, snapshot, &mut rng)
        } else {
            scan(snapshot, space, 0..space.len(), &mut rng)
                .best()
                .map(|(index, liability)| ProtectionDecision {
                    index,
                    liability,
                    batches: 1,
                })
        };

        match decision {
            Some(decision) => {
                tracing::info!(
                    round = %snapshot.round,
                    bettors = snapshot.distinct_bettors,
                    index = decision.index,
                    liability = decision.liability,
                    batches = decision.batches,
                    "Protection applied"
                );
                Some(decision)
            }
            None => {
                tracing::warn!(round = %snapshot.round, "Protection found no candidate");
                None
            }
        }
    }

    fn search_batches<R: Rng + ?Sized>(
        &self,
        space: &CombinationSpace,
        snapshot: &LiabilitySnapshot,
        rng: &mut R,
    ) -> Option<ProtectionDecision> {
        let batch_size = self.config.batch_size.max(1);
        let mut preferred = preferred_candidates(space, snapshot);
        preferred.shuffle(rng);
        let mut preferred = preferred.chunks(batch_size);

        let mut tracker = MinTracker::new();
        let mut batches = 0;
        while batches < self.config.max_batches {
            let batch = match preferred.next() {
                Some(chunk) => chunk.to_vec(),
                None => space.sample(batch_size, rng),
            };
            batches += 1;
            tracker.merge(scan(snapshot, space, batch, rng), rng);

            if let Some((_, liability)) = tracker.best() {
                if liability.abs() <= LIABILITY_EPSILON {
                    break;
                }
            }
        }

        tracker.best().map(|(index, liability)| ProtectionDecision {
            index,
            liability,
            batches,
        })
    }
}

/// Outcomes that lose the higher-exposure side of every unbalanced
/// complementary pair. Empty when no pair is unbalanced.
pub fn preferred_candidates(space: &CombinationSpace, snapshot: &LiabilitySnapshot) -> Vec<u32> {
    let rules = space.rules();
    let avoid: Vec<BetKey> = rules
        .complementary_pairs()
        .into_iter()
        .filter_map(|(a, b)| {
            let exposure_a = snapshot.key_exposure(rules.as_ref(), &a);
            let exposure_b = snapshot.key_exposure(rules.as_ref(), &b);
            if liabilities_equal(exposure_a, exposure_b) {
                None
            } else if exposure_a > exposure_b {
                Some(a)
            } else {
                Some(b)
            }
        })
        .collect();

    if avoid.is_empty() {
        return Vec::new();
    }
    space.filter(|outcome| avoid.iter().all(|key| rules.odds(key, outcome).is_none()))
}
