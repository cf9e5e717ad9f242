//! Periodiq - outcome resolution engine for periodic betting rounds
//!
//! Tracks the liability every possible result would carry, picks the
//! cheapest outcome for the house under a protection policy, and publishes
//! exactly one result per round even when many workers race to resolve it.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod factory;
pub mod fairness;
pub mod games;
pub mod ledger;
pub mod logging;
pub mod metrics;
pub mod protection;
pub mod round;
pub mod selector;
pub mod store;

pub use config::{ConfigLoader, PeriodiqConfig};
pub use coordinator::{Resolution, RoundResolutionCoordinator, RoundResolvedEvent};
pub use errors::{PeriodiqError, PeriodiqResult, ResolveError};
pub use factory::{Engine, EngineFactory, EngineParts};
pub use games::{GameType, Outcome, OutcomeSummary};
pub use ledger::{ExposureLedger, RawBet, RecordOutcome};
pub use round::{RoundKey, RoundPhase};
pub use selector::{OutcomeSelector, Selection, StrategyKind};
