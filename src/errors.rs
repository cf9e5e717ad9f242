//! Error types for the periodiq resolution engine
//!
//! One enum per failure family, folded into [`PeriodiqError`] so call sites
//! can use `?` across module boundaries.

use crate::games::GameType;
use std::time::Duration;

/// Root error type for all periodiq operations
#[derive(Debug, thiserror::Error)]
pub enum PeriodiqError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bet error: {0}")]
    Bet(#[from] BetError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolveError),
}

/// Configuration and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Missing required field: {0}")]
    MissingRequired(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),
}

/// Shared-state store failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The store is temporarily unreachable; callers retry with backoff
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupted value at {key}: {reason}")]
    Corrupted { key: String, reason: String },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// A single bet record that cannot be used for liability accounting
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BetError {
    #[error("Unsupported game type: {0}")]
    UnknownGame(String),

    #[error("Unknown bet type '{bet_type}' for {game}")]
    UnknownBetType { game: GameType, bet_type: String },

    #[error("Invalid bet value '{value}' for bet type '{bet_type}'")]
    InvalidValue { bet_type: String, value: String },

    #[error("Invalid bet amount: {0}")]
    InvalidAmount(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Bet belongs to round {bet_round}, not {expected}")]
    RoundMismatch { expected: String, bet_round: String },
}

/// A selection strategy could not produce a result within its budget
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("Strategy timed out after {0:?}")]
    Timeout(Duration),

    #[error("Worker failed: {0}")]
    WorkerFailed(String),

    #[error("Candidate pool is empty")]
    SpaceExhausted,

    #[error("Incremental index not initialized for this round")]
    NotInitialized,
}

/// Round resolution failures surfaced to the scheduler
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Round {0} has not ended yet")]
    RoundOpen(String),

    #[error("Round {0} is archived and has no committed result")]
    Archived(String),

    #[error("Invalid round identifier: {0}")]
    InvalidRound(String),

    #[error("Round {round} still locked by another process after {attempts} polls")]
    Contention { round: String, attempts: u32 },

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Persisting result failed: {0}")]
    Persistence(String),

    #[error("No outcome could be selected: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Result serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No rules registered for {0}")]
    UnknownGame(GameType),
}

pub type PeriodiqResult<T> = Result<T, PeriodiqError>;
