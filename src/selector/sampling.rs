//! Candidate generation for large spaces.
//!
//! Both strategies shrink the candidate pool before scanning. Smart sampling
//! bets on statistically rare sums being lightly exposed; statistical
//! sampling avoids every digit anyone bet on.

use crate::games::CombinationSpace;
use crate::ledger::LiabilitySnapshot;
use rand::Rng;

/// Outcomes in the rarest sum buckets, capped at `limit`
pub fn smart_candidates<R: Rng + ?Sized>(
    space: &CombinationSpace,
    fraction: f64,
    limit: usize,
    rng: &mut R,
) -> Vec<u32> {
    cap(space.rare_sum_candidates(fraction), limit, rng)
}

/// Outcomes that avoid every concretely bet digit.
///
/// Dimensions without digit bets are unconstrained. When a constrained
/// dimension has no free digit left, or nothing survives the filter, the
/// game's extreme outcomes are used instead.
pub fn statistical_candidates<R: Rng + ?Sized>(
    space: &CombinationSpace,
    snapshot: &LiabilitySnapshot,
    limit: usize,
    rng: &mut R,
) -> Vec<u32> {
    let rules = space.rules();
    let mut allowed: Vec<Option<[bool; 10]>> = Vec::with_capacity(rules.dimensions());

    for dimension in 0..rules.dimensions() {
        let mut digits = [true; 10];
        let mut constrained = false;
        for digit in 0..10u8 {
            let Some(key) = rules.digit_key(dimension, digit) else {
                continue;
            };
            if snapshot.stake(&key) > 0.0 {
                digits[digit as usize] = false;
                constrained = true;
            }
        }
        if constrained && !digits.iter().any(|free| *free) {
            tracing::debug!(dimension, "Every digit bet, using extreme outcomes");
            return rules.extreme_outcomes();
        }
        allowed.push(constrained.then_some(digits));
    }

    let candidates = space.filter(|outcome| {
        outcome
            .values()
            .iter()
            .zip(allowed.iter())
            .all(|(digit, rule)| match rule {
                Some(digits) => digits.get(*digit as usize).copied().unwrap_or(false),
                None => true,
            })
    });

    if candidates.is_empty() {
        return rules.extreme_outcomes();
    }
    cap(candidates, limit, rng)
}

fn cap<R: Rng + ?Sized>(candidates: Vec<u32>, limit: usize, rng: &mut R) -> Vec<u32> {
    if candidates.len() <= limit {
        return candidates;
    }
    rand::seq::index::sample(rng, candidates.len(), limit)
        .into_iter()
        .map(|i| candidates[i])
        .collect()
}
