//! Exposure ledger: per-round liability accounting in the shared store.
//!
//! Every bet is folded into additive hash increments, so concurrent recorders
//! never need a lock. A bet's increments reach the store in one write; when it
//! fails nothing was counted and the caller may simply retry. Materialized spaces accumulate liability per outcome
//! (`net * odds(key, outcome)`); large spaces accumulate net stake per bet key
//! and liabilities are derived when a snapshot is evaluated.

pub mod bet;
pub mod index;
pub mod snapshot;

pub use bet::{Bet, RawBet};
pub use index::{IndexRegistry, LiabilityIndex};
pub use snapshot::{Exposure, LiabilitySnapshot};

use crate::config::LedgerConfig;
use crate::errors::{BetError, StoreError};
use crate::games::{split_key, CombinationSpace, SpaceRegistry};
use crate::metrics::EngineMetrics;
use crate::round::RoundKey;
use crate::store::{keys, BetWrite, SharedStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const BET_COUNT: &str = "bet_count";
const GROSS: &str = "gross";
const NET: &str = "net";

/// What happened to a submitted bet
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Recorded,
    /// Malformed input, logged and left out of the exposure
    Skipped(BetError),
}

pub struct ExposureLedger {
    store: Arc<dyn SharedStore>,
    spaces: Arc<SpaceRegistry>,
    config: LedgerConfig,
    index: Arc<IndexRegistry>,
    metrics: Arc<EngineMetrics>,
}

impl ExposureLedger {
    pub fn new(
        store: Arc<dyn SharedStore>,
        spaces: Arc<SpaceRegistry>,
        config: LedgerConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            store,
            spaces,
            config,
            index: Arc::new(IndexRegistry::new()),
            metrics,
        }
    }

    pub fn spaces(&self) -> &Arc<SpaceRegistry> {
        &self.spaces
    }

    pub fn index(&self) -> &Arc<IndexRegistry> {
        &self.index
    }

    fn ttl(&self) -> Option<Duration> {
        Some(Duration::from_secs(self.config.exposure_ttl_secs))
    }

    fn space(&self, round: &RoundKey) -> Result<Arc<CombinationSpace>, BetError> {
        self.spaces
            .get(round.game)
            .ok_or_else(|| BetError::UnknownGame(round.game.to_string()))
    }

    /// Normalize and record a bet. Malformed bets are skipped, not errors.
    pub async fn record_bet(&self, round: &RoundKey, raw: &RawBet) -> Result<RecordOutcome, StoreError> {
        let normalized = self
            .space(round)
            .and_then(|space| Bet::normalize(raw, round, space.rules().as_ref(), self.config.fee_rate));

        match normalized {
            Ok(bet) => {
                self.record_normalized(&bet).await?;
                Ok(RecordOutcome::Recorded)
            }
            Err(e) => {
                tracing::warn!(round = %round, error = %e, "Skipping malformed bet");
                self.metrics.record_skipped_bet();
                Ok(RecordOutcome::Skipped(e))
            }
        }
    }

    /// Record a bet that was already normalized upstream
    pub async fn record_normalized(&self, bet: &Bet) -> Result<(), StoreError> {
        let round = &bet.round;
        let space = self
            .spaces
            .get(round.game)
            .ok_or_else(|| StoreError::Corrupted {
                key: keys::exposure(round),
                reason: format!("no combination space for {}", round.game),
            })?;
        let ttl = self.ttl();

        let per_outcome: Vec<(u32, f64)> = if space.is_large() {
            Vec::new()
        } else {
            let rules = space.rules();
            (0..space.len())
                .filter_map(|index| {
                    let odds = rules.odds(&bet.key, &space.outcome(index))?;
                    Some((index, bet.net_amount * odds))
                })
                .collect()
        };

        let increments: Vec<(String, f64)> = if space.is_large() {
            vec![(bet.key.to_string(), bet.net_amount)]
        } else {
            per_outcome
                .iter()
                .map(|(index, delta)| (index.to_string(), *delta))
                .collect()
        };

        let write = BetWrite {
            exposure_key: keys::exposure(round),
            exposure: increments,
            bettors_key: keys::bettors(round),
            bettor: bet.user_id.clone(),
            stats_key: keys::stats(round),
            stats: vec![
                (BET_COUNT.to_string(), 1.0),
                (GROSS.to_string(), bet.gross_amount),
                (NET.to_string(), bet.net_amount),
            ],
            ttl,
        };
        self.store.record_bet(&write).await?;

        if self.config.incremental_index
            && !space.is_large()
            && space.len() <= self.config.incremental_max_space
        {
            self.index.record(round, space.len(), &per_outcome);
        }

        self.metrics.record_bet();
        tracing::debug!(
            round = %round,
            key = %bet.key,
            net = bet.net_amount,
            "Bet recorded"
        );
        Ok(())
    }

    pub async fn snapshot(&self, round: &RoundKey) -> Result<LiabilitySnapshot, StoreError> {
        let space = self.spaces.get(round.game).ok_or_else(|| StoreError::Corrupted {
            key: keys::exposure(round),
            reason: format!("no combination space for {}", round.game),
        })?;

        let fields = self.store.hash_get_all(&keys::exposure(round)).await?;
        let stats = self.store.hash_get_all(&keys::stats(round)).await?;
        let distinct_bettors = self.store.set_len(&keys::bettors(round)).await? as u64;

        let mut snapshot = LiabilitySnapshot::empty(round.clone(), &space);
        snapshot.bet_count = stats.get(BET_COUNT).copied().unwrap_or(0.0).round() as u64;
        snapshot.gross_volume = stats.get(GROSS).copied().unwrap_or(0.0);
        snapshot.net_volume = stats.get(NET).copied().unwrap_or(0.0);
        snapshot.distinct_bettors = distinct_bettors;

        match &mut snapshot.exposure {
            Exposure::PerOutcome(liabilities) => {
                for (field, liability) in fields {
                    match field.parse::<usize>() {
                        Ok(index) if index < liabilities.len() => liabilities[index] = liability,
                        _ => tracing::warn!(round = %round, field = %field, "Ignoring unknown exposure field"),
                    }
                }
            }
            Exposure::PerKey(stakes) => {
                let rules = space.rules();
                for (field, stake) in fields {
                    let key = split_key(&field).and_then(|(t, v)| rules.parse_key(t, v).ok());
                    match key {
                        Some(key) => {
                            *stakes.entry(key).or_insert(0.0) += stake;
                        }
                        None => tracing::warn!(round = %round, field = %field, "Ignoring unknown exposure field"),
                    }
                }
            }
        }

        Ok(snapshot)
    }

    pub async fn get_liability(&self, round: &RoundKey, index: u32) -> Result<f64, StoreError> {
        let snapshot = self.snapshot(round).await?;
        Ok(match self.spaces.get(round.game) {
            Some(space) => snapshot.liability(&space, index),
            None => 0.0,
        })
    }

    /// Dashboard map: outcome label or bet key to amount
    pub async fn liability_snapshot(&self, round: &RoundKey) -> Result<BTreeMap<String, f64>, StoreError> {
        let snapshot = self.snapshot(round).await?;
        Ok(match self.spaces.get(round.game) {
            Some(space) => snapshot.as_map(&space),
            None => BTreeMap::new(),
        })
    }

    /// Drop all state recorded for `round`
    pub async fn reset(&self, round: &RoundKey) -> Result<(), StoreError> {
        self.store.delete(&keys::exposure(round)).await?;
        self.store.delete(&keys::stats(round)).await?;
        self.store.delete(&keys::bettors(round)).await?;
        self.index.remove(round);
        tracing::debug!(round = %round, "Round exposure reset");
        Ok(())
    }
}
