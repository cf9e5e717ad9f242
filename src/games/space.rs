//! Combination spaces: every outcome of a game plus its winning conditions.
//!
//! Small spaces are fully materialized with their condition sets at load.
//! Large spaces keep only the compact outcome table and derive conditions on
//! demand, which keeps the 100,000-outcome game at a few megabytes.

use crate::games::rules::{GameRules, RulesRegistry};
use crate::games::types::{BetKey, GameType, Outcome};
use once_cell::sync::{Lazy, OnceCell};
use rand::Rng;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Spaces above this size are not materialized with condition sets
pub const DEFAULT_LARGE_SPACE_THRESHOLD: u32 = 1_000;

static STANDARD_SPACES: Lazy<Arc<SpaceRegistry>> = Lazy::new(|| {
    Arc::new(SpaceRegistry::new(
        RulesRegistry::standard(),
        DEFAULT_LARGE_SPACE_THRESHOLD,
    ))
});

pub struct CombinationSpace {
    rules: Arc<dyn GameRules>,
    outcomes: Vec<Outcome>,
    conditions: Option<Vec<Vec<BetKey>>>,
    sum_frequencies: BTreeMap<u32, u32>,
}

impl CombinationSpace {
    pub fn build(rules: Arc<dyn GameRules>, large_threshold: u32) -> Self {
        let size = rules.space_size();
        let outcomes: Vec<Outcome> = (0..size).map(|i| rules.outcome(i)).collect();

        let conditions = (size <= large_threshold).then(|| {
            outcomes
                .iter()
                .map(|o| rules.winning_conditions(o))
                .collect::<Vec<_>>()
        });

        let mut sum_frequencies = BTreeMap::new();
        for outcome in &outcomes {
            *sum_frequencies.entry(outcome.sum()).or_insert(0) += 1;
        }

        tracing::debug!(
            game = %rules.game_type(),
            size,
            materialized = conditions.is_some(),
            "Combination space loaded"
        );

        Self {
            rules,
            outcomes,
            conditions,
            sum_frequencies,
        }
    }

    pub fn game(&self) -> GameType {
        self.rules.game_type()
    }

    pub fn rules(&self) -> &Arc<dyn GameRules> {
        &self.rules
    }

    pub fn len(&self) -> u32 {
        self.outcomes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True when condition sets are derived per request instead of cached
    pub fn is_large(&self) -> bool {
        self.conditions.is_none()
    }

    pub fn outcome(&self, index: u32) -> Outcome {
        self.outcomes
            .get(index as usize)
            .copied()
            .unwrap_or_else(|| self.rules.outcome(index))
    }

    pub fn winning_conditions(&self, index: u32) -> Cow<'_, [BetKey]> {
        match self.conditions.as_ref().and_then(|c| c.get(index as usize)) {
            Some(keys) => Cow::Borrowed(keys.as_slice()),
            None => Cow::Owned(self.rules.winning_conditions(&self.outcome(index))),
        }
    }

    /// `betType:betValue` strings that pay against the outcome
    pub fn winning_condition_strings(&self, index: u32) -> BTreeSet<String> {
        self.winning_conditions(index)
            .iter()
            .map(|k| k.to_string())
            .collect()
    }

    /// Uniform sample of `n` distinct outcome indices (all of them if `n >= len`)
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<u32> {
        let len = self.outcomes.len();
        if n >= len {
            return (0..len as u32).collect();
        }
        rand::seq::index::sample(rng, len, n)
            .into_iter()
            .map(|i| i as u32)
            .collect()
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<u32>
    where
        F: Fn(&Outcome) -> bool,
    {
        self.outcomes
            .iter()
            .filter(|o| predicate(o))
            .map(|o| o.index)
            .collect()
    }

    /// Batched lookup by id; unknown ids are skipped
    pub fn lookup(&self, ids: &[u32]) -> Vec<Outcome> {
        ids.iter()
            .filter_map(|id| self.outcomes.get(*id as usize).copied())
            .collect()
    }

    /// Outcome count per digit-sum bucket
    pub fn sum_frequencies(&self) -> &BTreeMap<u32, u32> {
        &self.sum_frequencies
    }

    /// Outcomes in the statistically rarest sum buckets.
    ///
    /// Buckets are taken from least to most frequent until at least
    /// `fraction` of the space is covered.
    pub fn rare_sum_candidates(&self, fraction: f64) -> Vec<u32> {
        let target = (self.outcomes.len() as f64 * fraction.clamp(0.0, 1.0)).ceil() as u64;
        if target == 0 {
            return Vec::new();
        }

        let mut buckets: Vec<(u32, u32)> = self
            .sum_frequencies
            .iter()
            .map(|(sum, count)| (*sum, *count))
            .collect();
        buckets.sort_by_key(|(sum, count)| (*count, *sum));

        let mut rare = BTreeSet::new();
        let mut covered = 0u64;
        for (sum, count) in buckets {
            if covered >= target {
                break;
            }
            rare.insert(sum);
            covered += count as u64;
        }

        self.filter(|o| rare.contains(&o.sum()))
    }
}

/// Process-wide cache of combination spaces, one per registered game
pub struct SpaceRegistry {
    rules: RulesRegistry,
    large_threshold: u32,
    spaces: HashMap<GameType, OnceCell<Arc<CombinationSpace>>>,
}

impl SpaceRegistry {
    pub fn new(rules: RulesRegistry, large_threshold: u32) -> Self {
        let spaces = rules
            .games()
            .into_iter()
            .map(|g| (g, OnceCell::new()))
            .collect();
        Self {
            rules,
            large_threshold,
            spaces,
        }
    }

    /// Shared registry for the standard games
    pub fn standard() -> Arc<SpaceRegistry> {
        STANDARD_SPACES.clone()
    }

    pub fn rules(&self) -> &RulesRegistry {
        &self.rules
    }

    /// Space for `game`, built on first access
    pub fn get(&self, game: GameType) -> Option<Arc<CombinationSpace>> {
        let cell = self.spaces.get(&game)?;
        let rules = self.rules.get(game)?;
        let threshold = self.large_threshold;
        Some(
            cell.get_or_init(|| Arc::new(CombinationSpace::build(rules, threshold)))
                .clone(),
        )
    }

    /// Load every space up front
    pub fn warm_up(&self) {
        for game in self.rules.games() {
            let _ = self.get(game);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_small_spaces_are_materialized() {
        let registry = SpaceRegistry::standard();
        let wingo = registry.get(GameType::Wingo).unwrap();
        let k3 = registry.get(GameType::K3).unwrap();
        let five_d = registry.get(GameType::FiveD).unwrap();

        assert!(!wingo.is_large());
        assert!(!k3.is_large());
        assert!(five_d.is_large());
        assert_eq!(five_d.len(), 100_000);
        assert!(matches!(wingo.winning_conditions(3), Cow::Borrowed(_)));
    }

    #[test]
    fn test_winning_condition_strings_deterministic() {
        let space = SpaceRegistry::standard().get(GameType::Wingo).unwrap();
        let first = space.winning_condition_strings(0);
        let second = space.winning_condition_strings(0);
        assert_eq!(first, second);
        let expected: BTreeSet<String> = ["number:0", "color:red", "color:violet", "size:small"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(first, expected);
    }

    #[test]
    fn test_sample_and_filter() {
        let space = SpaceRegistry::standard().get(GameType::FiveD).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        let sample = space.sample(1_000, &mut rng);
        assert_eq!(sample.len(), 1_000);
        let unique: BTreeSet<_> = sample.iter().collect();
        assert_eq!(unique.len(), 1_000);

        let a_zero = space.filter(|o| o.values()[0] == 0);
        assert_eq!(a_zero.len(), 10_000);
        assert!(space.lookup(&a_zero[..3]).iter().all(|o| o.values()[0] == 0));
    }

    #[test]
    fn test_rare_sum_candidates_cover_fraction() {
        let space = SpaceRegistry::standard().get(GameType::FiveD).unwrap();
        let rare = space.rare_sum_candidates(0.1);
        assert!(rare.len() >= 10_000);
        assert!(rare.len() < 30_000);
        // extremes are the rarest sums
        assert!(rare.contains(&0));
        assert!(rare.contains(&99_999));
        // sum 22 is the most common bucket
        assert!(!rare.contains(&55_840));
    }
}
