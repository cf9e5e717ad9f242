//! Optimal outcome selection.
//!
//! A plan is an ordered list of strategies; the first one that produces a
//! selection wins and failures fall through to the next. Every strategy
//! resolves ties uniformly at random.

pub mod parallel;
pub mod sampling;
pub mod scan;

pub use parallel::ParallelEvaluator;
pub use scan::MinTracker;

use crate::config::{ParallelConfig, SelectorConfig};
use crate::errors::StrategyError;
use crate::games::CombinationSpace;
use crate::ledger::{IndexRegistry, LiabilitySnapshot};
use crate::metrics::EngineMetrics;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    NoExposure,
    Incremental,
    Parallel,
    SmartSampling,
    StatisticalSampling,
    FullScan,
    UniformRandom,
}

impl StrategyKind {
    pub const COUNT: usize = 7;

    pub const ALL: [StrategyKind; Self::COUNT] = [
        StrategyKind::NoExposure,
        StrategyKind::Incremental,
        StrategyKind::Parallel,
        StrategyKind::SmartSampling,
        StrategyKind::StatisticalSampling,
        StrategyKind::FullScan,
        StrategyKind::UniformRandom,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrategyKind::NoExposure => "no_exposure",
            StrategyKind::Incremental => "incremental",
            StrategyKind::Parallel => "parallel",
            StrategyKind::SmartSampling => "smart_sampling",
            StrategyKind::StatisticalSampling => "statistical_sampling",
            StrategyKind::FullScan => "full_scan",
            StrategyKind::UniformRandom => "uniform_random",
        };
        write!(f, "{}", name)
    }
}

/// Chosen outcome with its liability under the snapshot it was chosen from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub index: u32,
    pub liability: f64,
    pub strategy: StrategyKind,
}

pub struct OutcomeSelector {
    config: SelectorConfig,
    parallel_enabled: bool,
    parallel: ParallelEvaluator,
    index: Option<Arc<IndexRegistry>>,
    metrics: Arc<EngineMetrics>,
}

impl OutcomeSelector {
    pub fn new(
        config: SelectorConfig,
        parallel: &ParallelConfig,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            config,
            parallel_enabled: parallel.enabled,
            parallel: ParallelEvaluator::new(parallel),
            index: None,
            metrics,
        }
    }

    /// Consult an incremental index before scanning
    pub fn with_index(mut self, index: Arc<IndexRegistry>) -> Self {
        self.index = Some(index);
        self
    }

    /// Ordered strategies to try for this snapshot
    pub fn plan(&self, space: &CombinationSpace, snapshot: &LiabilitySnapshot) -> Vec<StrategyKind> {
        if !snapshot.has_bets() {
            return vec![StrategyKind::NoExposure];
        }

        let mut plan = Vec::with_capacity(4);
        if self.index.is_some() && !space.is_large() {
            plan.push(StrategyKind::Incremental);
        }

        if space.is_large() {
            let volume = snapshot.bet_count;
            if self.parallel_enabled && volume > self.config.low_volume_threshold {
                plan.push(StrategyKind::Parallel);
            }
            plan.push(if volume <= self.config.low_volume_threshold {
                StrategyKind::FullScan
            } else if volume <= self.config.high_volume_threshold {
                StrategyKind::SmartSampling
            } else {
                StrategyKind::StatisticalSampling
            });
            if !plan.contains(&StrategyKind::FullScan) {
                plan.push(StrategyKind::FullScan);
            }
        } else {
            plan.push(StrategyKind::FullScan);
        }
        plan
    }

    /// Run the plan until one strategy succeeds
    pub async fn select(
        &self,
        space: Arc<CombinationSpace>,
        snapshot: Arc<LiabilitySnapshot>,
    ) -> Result<Selection, StrategyError> {
        let plan = self.plan(&space, &snapshot);
        let mut last_error = StrategyError::SpaceExhausted;

        for kind in plan {
            match self.run(kind, &space, &snapshot).await {
                Ok(selection) => {
                    self.metrics.record_strategy(kind);
                    tracing::debug!(
                        round = %snapshot.round,
                        strategy = %kind,
                        index = selection.index,
                        liability = selection.liability,
                        "Outcome selected"
                    );
                    return Ok(selection);
                }
                Err(e) => {
                    self.metrics.record_strategy_failure();
                    tracing::warn!(round = %snapshot.round, strategy = %kind, error = %e, "Strategy failed, trying next");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn run(
        &self,
        kind: StrategyKind,
        space: &Arc<CombinationSpace>,
        snapshot: &Arc<LiabilitySnapshot>,
    ) -> Result<Selection, StrategyError> {
        let (index, liability) = match kind {
            StrategyKind::Parallel => {
                self.parallel
                    .evaluate(space.clone(), snapshot.clone())
                    .await?
            }
            _ => self.run_inline(kind, space, snapshot)?,
        };
        Ok(Selection {
            index,
            liability,
            strategy: kind,
        })
    }

    fn run_inline(
        &self,
        kind: StrategyKind,
        space: &CombinationSpace,
        snapshot: &LiabilitySnapshot,
    ) -> Result<(u32, f64), StrategyError> {
        let mut rng = rand::thread_rng();
        let candidates = match kind {
            StrategyKind::NoExposure | StrategyKind::UniformRandom => {
                let index = random_index(space, &mut rng)?;
                return Ok((index, snapshot.liability(space, index)));
            }
            StrategyKind::Incremental => {
                let index = self.index.as_ref().ok_or(StrategyError::NotInitialized)?;
                return index
                    .consistent_minimum(&snapshot.round, snapshot.bet_count, &mut rng)
                    .ok_or(StrategyError::NotInitialized);
            }
            StrategyKind::FullScan => {
                if space.is_large() {
                    space.sample(self.config.full_scan_sample_limit, &mut rng)
                } else {
                    (0..space.len()).collect()
                }
            }
            StrategyKind::SmartSampling => sampling::smart_candidates(
                space,
                self.config.smart_sample_fraction,
                self.config.full_scan_sample_limit,
                &mut rng,
            ),
            StrategyKind::StatisticalSampling => sampling::statistical_candidates(
                space,
                snapshot,
                self.config.statistical_sample_limit,
                &mut rng,
            ),
            StrategyKind::Parallel => return Err(StrategyError::NotInitialized),
        };

        scan::scan(snapshot, space, candidates, &mut rng)
            .best()
            .ok_or(StrategyError::SpaceExhausted)
    }
}

/// Uniformly random outcome, the last resort when every strategy failed
pub fn uniform_random(space: &CombinationSpace, snapshot: &LiabilitySnapshot) -> Option<Selection> {
    let mut rng = rand::thread_rng();
    let index = random_index(space, &mut rng).ok()?;
    Some(Selection {
        index,
        liability: snapshot.liability(space, index),
        strategy: StrategyKind::UniformRandom,
    })
}

fn random_index<R: Rng + ?Sized>(space: &CombinationSpace, rng: &mut R) -> Result<u32, StrategyError> {
    if space.is_empty() {
        return Err(StrategyError::SpaceExhausted);
    }
    Ok(rng.gen_range(0..space.len()))
}
