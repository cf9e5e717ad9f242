//! Payout rules capability
//!
//! Every game variant implements [`GameRules`] once; the ledger, selector and
//! protection policy only ever talk to the trait, never to a game name.

use crate::errors::BetError;
use crate::games::five_d::FiveDRules;
use crate::games::k3::K3Rules;
use crate::games::types::{BetKey, GameType, Outcome};
use crate::games::wingo::WingoRules;
use std::collections::HashMap;
use std::sync::Arc;

pub trait GameRules: Send + Sync {
    fn game_type(&self) -> GameType;

    /// Number of outcomes in the result space
    fn space_size(&self) -> u32;

    /// Decode an outcome from its index. Indices are `0..space_size()`.
    fn outcome(&self, index: u32) -> Outcome;

    /// Keys that pay out against `outcome`. Deterministic.
    fn winning_conditions(&self, outcome: &Outcome) -> Vec<BetKey>;

    fn parse_key(&self, bet_type: &str, bet_value: &str) -> Result<BetKey, BetError>;

    /// Effective multiplier of `key` against `outcome`; `None` when the key loses.
    fn odds(&self, key: &BetKey, outcome: &Outcome) -> Option<f64>;

    /// Multiplier quoted at placement time
    fn nominal_odds(&self, key: &BetKey) -> f64;

    /// Every key a bettor can place
    fn all_keys(&self) -> Vec<BetKey>;

    /// Independent digit positions of an outcome
    fn dimensions(&self) -> usize {
        1
    }

    /// Key for a concrete digit at a position, if the game offers one
    fn digit_key(&self, _dimension: usize, _digit: u8) -> Option<BetKey> {
        None
    }

    /// Rare fixed outcomes used when sampling has nothing left to offer
    fn extreme_outcomes(&self) -> Vec<u32> {
        vec![0, self.space_size().saturating_sub(1)]
    }

    /// Mutually exclusive key pairs (exactly one side wins for every outcome)
    fn complementary_pairs(&self) -> Vec<(BetKey, BetKey)> {
        Vec::new()
    }
}

/// Lookup of rules by game type
#[derive(Clone)]
pub struct RulesRegistry {
    rules: HashMap<GameType, Arc<dyn GameRules>>,
}

impl RulesRegistry {
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Registry with the three platform games
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(WingoRules));
        registry.register(Arc::new(K3Rules));
        registry.register(Arc::new(FiveDRules));
        registry
    }

    pub fn register(&mut self, rules: Arc<dyn GameRules>) {
        self.rules.insert(rules.game_type(), rules);
    }

    pub fn get(&self, game: GameType) -> Option<Arc<dyn GameRules>> {
        self.rules.get(&game).cloned()
    }

    pub fn games(&self) -> Vec<GameType> {
        let mut games: Vec<_> = self.rules.keys().copied().collect();
        games.sort();
        games
    }
}

impl Default for RulesRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = RulesRegistry::standard();
        assert_eq!(registry.games(), vec![GameType::Wingo, GameType::K3, GameType::FiveD]);
        assert_eq!(registry.get(GameType::K3).unwrap().space_size(), 216);
    }

    #[test]
    fn test_odds_consistent_with_winning_conditions() {
        let registry = RulesRegistry::standard();
        for game in [GameType::Wingo, GameType::K3] {
            let rules = registry.get(game).unwrap();
            for index in 0..rules.space_size() {
                let outcome = rules.outcome(index);
                let winners = rules.winning_conditions(&outcome);
                for key in rules.all_keys() {
                    let pays = rules.odds(&key, &outcome).is_some();
                    assert_eq!(pays, winners.contains(&key), "{} vs {}", key, outcome.label());
                }
            }
        }
    }

    #[test]
    fn test_complementary_pairs_are_exclusive() {
        let registry = RulesRegistry::standard();
        for game in GameType::all() {
            let rules = registry.get(game).unwrap();
            for index in [0, 7, rules.space_size() / 2, rules.space_size() - 1] {
                let outcome = rules.outcome(index);
                let winners = rules.winning_conditions(&outcome);
                for (a, b) in rules.complementary_pairs() {
                    assert!(winners.contains(&a) ^ winners.contains(&b), "{} / {}", a, b);
                }
            }
        }
    }
}
