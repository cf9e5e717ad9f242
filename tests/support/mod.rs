//! Shared fixtures for the integration tests
#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use periodiq::{
    coordinator::{InMemoryResultRepository, LoggingSettlement, RecordingSleeper, Sleeper, TokioSleeper},
    round::ManualClock,
    store::MemoryStore,
    Engine, EngineFactory, EngineParts, GameType, PeriodiqConfig, RawBet, RecordOutcome, RoundKey,
};
use std::sync::Arc;

/// Collaborators shared by every simulated process in one test
pub struct Cluster {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub repository: Arc<InMemoryResultRepository>,
    pub sleeper: Arc<dyn Sleeper>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::with_sleeper(Arc::new(TokioSleeper))
    }

    /// Poll delays are recorded instead of slept
    pub fn recording() -> (Self, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        (Self::with_sleeper(sleeper.clone()), sleeper)
    }

    pub fn with_sleeper(sleeper: Arc<dyn Sleeper>) -> Self {
        periodiq::logging::init_for_tests();
        Self {
            store: Arc::new(MemoryStore::new()),
            clock: Arc::new(ManualClock::new(start_of_day())),
            repository: Arc::new(InMemoryResultRepository::new()),
            sleeper,
        }
    }

    pub fn parts(&self) -> EngineParts {
        EngineParts {
            store: self.store.clone(),
            clock: self.clock.clone(),
            repository: self.repository.clone(),
            settlement: Arc::new(LoggingSettlement),
            sleeper: self.sleeper.clone(),
        }
    }

    /// One simulated worker process
    pub fn engine(&self, process_id: &str, mut config: PeriodiqConfig) -> Engine {
        config.coordinator.process_id = Some(process_id.to_string());
        EngineFactory::create(config, self.parts()).unwrap()
    }

    pub fn end_round(&self, round: &RoundKey) {
        self.clock
            .set(round.end_time().unwrap() + ChronoDuration::seconds(1));
    }

    pub fn freeze_round(&self, round: &RoundKey) {
        self.clock
            .set(round.end_time().unwrap() - ChronoDuration::seconds(2));
    }
}

pub fn start_of_day() -> DateTime<Utc> {
    "2024-03-15T00:00:00Z".parse().unwrap()
}

pub fn round(game: GameType, sequence: u32) -> RoundKey {
    let duration = match game {
        GameType::Wingo => 30,
        GameType::K3 => 60,
        GameType::FiveD => 180,
    };
    RoundKey::new(game, duration, format!("20240315{:04}", sequence), "default")
}

pub async fn bet(engine: &Engine, round: &RoundKey, user: &str, key: &str, amount: f64) {
    let (bet_type, bet_value) = key.split_once(':').unwrap();
    let outcome = engine
        .ledger
        .record_bet(round, &RawBet::new(user, bet_type, bet_value, amount))
        .await
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Recorded, "bet {} rejected", key);
}

/// Scenario bets: red from five users, 100 gross in total
pub async fn red_from_five_users(engine: &Engine, round: &RoundKey) {
    for user in ["u1", "u2", "u3", "u4", "u5"] {
        bet(engine, round, user, "color:red", 20.0).await;
    }
}
