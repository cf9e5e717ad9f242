//! Round identity, period arithmetic and clocks.
//!
//! A period id is a `YYYYMMDD` UTC day stamp followed by a zero-padded
//! four-digit sequence. Round `n` of a day ends at `day_start + n * duration`.

use crate::errors::ResolveError;
use crate::games::GameType;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

/// Identity of one betting round
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundKey {
    pub game: GameType,
    pub duration_secs: u32,
    pub period_id: String,
    pub timeline: String,
}

impl RoundKey {
    pub fn new(
        game: GameType,
        duration_secs: u32,
        period_id: impl Into<String>,
        timeline: impl Into<String>,
    ) -> Self {
        Self {
            game,
            duration_secs,
            period_id: period_id.into(),
            timeline: timeline.into(),
        }
    }

    /// Round that is open at `now`
    pub fn current(
        game: GameType,
        duration_secs: u32,
        timeline: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let period = Period::containing(now, duration_secs);
        Self::new(game, duration_secs, period.id(), timeline)
    }

    pub fn period(&self) -> Result<Period, ResolveError> {
        Period::parse(&self.period_id)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs as u64)
    }

    pub fn end_time(&self) -> Result<DateTime<Utc>, ResolveError> {
        if self.duration_secs == 0 {
            return Err(ResolveError::InvalidRound(format!(
                "{}: zero duration",
                self
            )));
        }
        Ok(self.period()?.end_time(self.duration_secs))
    }

    pub fn start_time(&self) -> Result<DateTime<Utc>, ResolveError> {
        Ok(self.end_time()? - ChronoDuration::seconds(self.duration_secs as i64))
    }

    /// Round that follows this one
    pub fn next(&self) -> Result<Self, ResolveError> {
        let end = self.end_time()?;
        Ok(Self::current(
            self.game,
            self.duration_secs,
            self.timeline.clone(),
            end,
        ))
    }
}

impl fmt::Display for RoundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.game, self.duration_secs, self.period_id, self.timeline
        )
    }
}

/// Parsed period id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub day: NaiveDate,
    pub sequence: u32,
}

impl Period {
    pub fn parse(period_id: &str) -> Result<Self, ResolveError> {
        let invalid = || ResolveError::InvalidRound(period_id.to_string());
        if period_id.len() != 12 || !period_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let day = NaiveDate::parse_from_str(&period_id[..8], "%Y%m%d").map_err(|_| invalid())?;
        let sequence: u32 = period_id[8..].parse().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }
        Ok(Self { day, sequence })
    }

    /// Period open at `now` for rounds of `duration_secs`
    pub fn containing(now: DateTime<Utc>, duration_secs: u32) -> Self {
        let day = now.date_naive();
        let day_start = Self::day_start(day);
        let elapsed = (now - day_start).num_seconds().max(0) as u32;
        let sequence = elapsed / duration_secs.max(1) + 1;
        Self { day, sequence }
    }

    pub fn id(&self) -> String {
        format!("{}{:04}", self.day.format("%Y%m%d"), self.sequence)
    }

    pub fn end_time(&self, duration_secs: u32) -> DateTime<Utc> {
        Self::day_start(self.day)
            + ChronoDuration::seconds(self.sequence as i64 * duration_secs as i64)
    }

    fn day_start(day: NaiveDate) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap_or_default())
    }
}

/// Lifecycle of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    Open,
    Frozen,
    Resolved,
    Archived,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundPhase::Open => write!(f, "open"),
            RoundPhase::Frozen => write!(f, "frozen"),
            RoundPhase::Resolved => write!(f, "resolved"),
            RoundPhase::Archived => write!(f, "archived"),
        }
    }
}

/// Wall clock seam
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock moved by hand
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += ChronoDuration::milliseconds(by.as_millis() as i64);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|t| *t).unwrap_or_else(|e| *e.into_inner())
    }
}

/// Timer collaborator deciding when a round stops taking bets and ends
pub trait PeriodClock: Send + Sync {
    /// Inside the freeze window before the end, betting closed
    fn is_frozen(&self, round: &RoundKey) -> bool;

    /// Time elapsed since the round ended, `None` while it is still running
    fn ended_for(&self, round: &RoundKey) -> Option<Duration>;

    fn has_ended(&self, round: &RoundKey) -> bool {
        self.ended_for(round).is_some()
    }
}

/// Derives round boundaries from the period id
pub struct ScheduleClock<C: Clock> {
    clock: C,
    freeze_window: Duration,
}

impl<C: Clock> ScheduleClock<C> {
    pub fn new(clock: C, freeze_window: Duration) -> Self {
        Self {
            clock,
            freeze_window,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn end_time(&self, round: &RoundKey) -> Option<DateTime<Utc>> {
        match round.end_time() {
            Ok(end) => Some(end),
            Err(e) => {
                tracing::warn!(round = %round, error = %e, "Unparseable round");
                None
            }
        }
    }
}

impl<C: Clock> PeriodClock for ScheduleClock<C> {
    fn is_frozen(&self, round: &RoundKey) -> bool {
        let Some(end) = self.end_time(round) else {
            return false;
        };
        let now = self.clock.now();
        let freeze_from = end - ChronoDuration::milliseconds(self.freeze_window.as_millis() as i64);
        now >= freeze_from && now < end
    }

    fn ended_for(&self, round: &RoundKey) -> Option<Duration> {
        let end = self.end_time(round)?;
        let now = self.clock.now();
        if now < end {
            return None;
        }
        (now - end).to_std().ok()
    }
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, s).unwrap()
    }

    #[test]
    fn test_period_parse_and_end_time() {
        let period = Period::parse("202403150042").unwrap();
        assert_eq!(period.sequence, 42);
        assert_eq!(period.id(), "202403150042");
        // 42 rounds of 30s = 21 minutes
        assert_eq!(period.end_time(30), at(0, 21, 0));

        assert!(Period::parse("2024031500").is_err());
        assert!(Period::parse("202413150001").is_err());
        assert!(Period::parse("202403150000").is_err());
    }

    #[test]
    fn test_current_round_contains_now() {
        let now = at(10, 0, 10);
        let round = RoundKey::current(GameType::Wingo, 60, "default", now);
        assert_eq!(round.period_id, "202403150601");
        assert!(round.start_time().unwrap() <= now);
        assert!(round.end_time().unwrap() > now);
        assert_eq!(round.to_string(), "wingo:60:202403150601:default");

        let next = round.next().unwrap();
        assert_eq!(next.period_id, "202403150602");
    }

    #[test]
    fn test_schedule_clock_phases() {
        let round = RoundKey::new(GameType::K3, 60, "202403150001", "default");
        let clock = Arc::new(ManualClock::new(at(0, 0, 30)));
        let schedule = ScheduleClock::new(clock.clone(), Duration::from_secs(5));

        assert!(!schedule.is_frozen(&round));
        assert!(!schedule.has_ended(&round));

        clock.set(at(0, 0, 56));
        assert!(schedule.is_frozen(&round));
        assert!(!schedule.has_ended(&round));

        clock.set(at(0, 1, 0));
        assert!(!schedule.is_frozen(&round));
        assert!(schedule.has_ended(&round));

        clock.advance(Duration::from_secs(90));
        assert_eq!(schedule.ended_for(&round), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_invalid_round_never_ends() {
        let round = RoundKey::new(GameType::K3, 60, "bogus", "default");
        let schedule = ScheduleClock::new(SystemClock, Duration::from_secs(5));
        assert!(!schedule.has_ended(&round));
        assert!(round.end_time().is_err());
    }
}
