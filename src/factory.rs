//! Engine assembly.
//!
//! Centralizes the wiring shared by the binary and the integration tests:
//! one metrics registry, one space registry, the ledger, selector and
//! coordinator, all pointed at the same shared store.

use crate::{
    config::PeriodiqConfig,
    coordinator::{
        Collaborators, InMemoryResultRepository, LoggingSettlement, ResultRepository,
        RoundResolutionCoordinator, SettlementHook, Sleeper, TokioSleeper,
    },
    errors::PeriodiqResult,
    fairness::Sha256Verifier,
    games::{SpaceRegistry, DEFAULT_LARGE_SPACE_THRESHOLD},
    ledger::ExposureLedger,
    metrics::EngineMetrics,
    protection::ProtectionPolicy,
    round::{Clock, ScheduleClock, SystemClock},
    selector::OutcomeSelector,
    store::{MemoryStore, SharedStore},
};
use std::sync::Arc;

/// Pluggable collaborators of one engine instance
#[derive(Clone)]
pub struct EngineParts {
    pub store: Arc<dyn SharedStore>,
    pub clock: Arc<dyn Clock>,
    pub repository: Arc<dyn ResultRepository>,
    pub settlement: Arc<dyn SettlementHook>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl EngineParts {
    /// Process-local store and repository, wall clock, real sleeps
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(SystemClock),
            repository: Arc::new(InMemoryResultRepository::new()),
            settlement: Arc::new(LoggingSettlement),
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

/// A fully wired resolution engine
pub struct Engine {
    pub config: PeriodiqConfig,
    pub metrics: Arc<EngineMetrics>,
    pub spaces: Arc<SpaceRegistry>,
    pub ledger: Arc<ExposureLedger>,
    pub coordinator: Arc<RoundResolutionCoordinator>,
}

pub struct EngineFactory;

impl EngineFactory {
    /// Build an engine from validated configuration and collaborators
    pub fn create(config: PeriodiqConfig, parts: EngineParts) -> PeriodiqResult<Engine> {
        config.validate()?;

        let metrics = Arc::new(EngineMetrics::new());
        let spaces = Self::create_spaces(&config);

        let ledger = Arc::new(ExposureLedger::new(
            parts.store.clone(),
            spaces.clone(),
            config.ledger.clone(),
            metrics.clone(),
        ));

        let mut selector = OutcomeSelector::new(config.selector.clone(), &config.parallel, metrics.clone());
        if config.ledger.incremental_index {
            selector = selector.with_index(ledger.index().clone());
        }

        let collaborators = Collaborators {
            repository: parts.repository,
            settlement: parts.settlement,
            hasher: Arc::new(Sha256Verifier::new(&config.coordinator.verification_key)),
            period_clock: Arc::new(ScheduleClock::new(
                parts.clock.clone(),
                config.coordinator.freeze_window(),
            )),
            clock: parts.clock,
            sleeper: parts.sleeper,
        };

        let coordinator = Arc::new(RoundResolutionCoordinator::new(
            config.coordinator.clone(),
            ledger.clone(),
            Arc::new(selector),
            ProtectionPolicy::new(config.protection.clone()),
            parts.store,
            collaborators,
            metrics.clone(),
        ));

        tracing::info!(
            process = coordinator.process_id(),
            large_space_threshold = config.selector.large_space_threshold,
            parallel = config.parallel.enabled,
            incremental_index = config.ledger.incremental_index,
            "Resolution engine ready"
        );

        Ok(Engine {
            config,
            metrics,
            spaces,
            ledger,
            coordinator,
        })
    }

    /// Engine with process-local collaborators
    pub fn in_memory(config: PeriodiqConfig) -> PeriodiqResult<Engine> {
        Self::create(config, EngineParts::in_memory())
    }

    fn create_spaces(config: &PeriodiqConfig) -> Arc<SpaceRegistry> {
        if config.selector.large_space_threshold == DEFAULT_LARGE_SPACE_THRESHOLD {
            SpaceRegistry::standard()
        } else {
            Arc::new(SpaceRegistry::new(
                crate::games::RulesRegistry::standard(),
                config.selector.large_space_threshold,
            ))
        }
    }
}
