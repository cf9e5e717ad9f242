use crate::games::{BetKey, CombinationSpace, GameRules};
use crate::round::RoundKey;
use std::collections::{BTreeMap, HashMap};

/// Recorded exposure for one round
#[derive(Debug, Clone, PartialEq)]
pub enum Exposure {
    /// Liability per outcome index, for materialized spaces
    PerOutcome(Vec<f64>),
    /// Net stake per bet key, for large spaces
    PerKey(HashMap<BetKey, f64>),
}

/// Immutable view of a round's exposure taken at one point in time.
///
/// Strategies, protection and the pre-computer all work from the same snapshot
/// so a decision never mixes bets recorded at different moments.
#[derive(Debug, Clone, PartialEq)]
pub struct LiabilitySnapshot {
    pub round: RoundKey,
    pub exposure: Exposure,
    pub bet_count: u64,
    pub distinct_bettors: u64,
    pub gross_volume: f64,
    pub net_volume: f64,
}

impl LiabilitySnapshot {
    pub fn empty(round: RoundKey, space: &CombinationSpace) -> Self {
        let exposure = if space.is_large() {
            Exposure::PerKey(HashMap::new())
        } else {
            Exposure::PerOutcome(vec![0.0; space.len() as usize])
        };
        Self {
            round,
            exposure,
            bet_count: 0,
            distinct_bettors: 0,
            gross_volume: 0.0,
            net_volume: 0.0,
        }
    }

    pub fn has_bets(&self) -> bool {
        self.bet_count > 0
    }

    /// Total payout owed if `index` is published
    pub fn liability(&self, space: &CombinationSpace, index: u32) -> f64 {
        match &self.exposure {
            Exposure::PerOutcome(liabilities) => {
                liabilities.get(index as usize).copied().unwrap_or(0.0)
            }
            Exposure::PerKey(stakes) => {
                if stakes.is_empty() {
                    return 0.0;
                }
                let outcome = space.outcome(index);
                let rules = space.rules();
                space
                    .winning_conditions(index)
                    .iter()
                    .filter_map(|key| {
                        let stake = stakes.get(key)?;
                        Some(stake * rules.odds(key, &outcome)?)
                    })
                    .sum()
            }
        }
    }

    /// Stake recorded on `key`; only tracked for large spaces
    pub fn stake(&self, key: &BetKey) -> f64 {
        match &self.exposure {
            Exposure::PerKey(stakes) => stakes.get(key).copied().unwrap_or(0.0),
            Exposure::PerOutcome(_) => 0.0,
        }
    }

    /// Worst-case payout of `key` at its quoted odds
    pub fn key_exposure(&self, rules: &dyn GameRules, key: &BetKey) -> f64 {
        self.stake(key) * rules.nominal_odds(key)
    }

    /// Keys with a stake, for large spaces
    pub fn staked_keys(&self) -> Vec<BetKey> {
        match &self.exposure {
            Exposure::PerKey(stakes) => {
                let mut keys: Vec<BetKey> = stakes
                    .iter()
                    .filter(|(_, stake)| **stake > 0.0)
                    .map(|(key, _)| *key)
                    .collect();
                keys.sort();
                keys
            }
            Exposure::PerOutcome(_) => Vec::new(),
        }
    }

    /// Dashboard view: outcome label to liability for materialized spaces,
    /// `betType:betValue` to net stake for large ones
    pub fn as_map(&self, space: &CombinationSpace) -> BTreeMap<String, f64> {
        match &self.exposure {
            Exposure::PerOutcome(liabilities) => liabilities
                .iter()
                .enumerate()
                .map(|(index, liability)| (space.outcome(index as u32).label(), *liability))
                .collect(),
            Exposure::PerKey(stakes) => stakes
                .iter()
                .map(|(key, stake)| (key.to_string(), *stake))
                .collect(),
        }
    }
}
