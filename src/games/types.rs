use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::BetError;

/// Supported game types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GameType {
    /// Color/number game, one digit 0-9
    #[serde(rename = "wingo")]
    Wingo,
    /// Three dice, faces 1-6
    #[serde(rename = "k3")]
    K3,
    /// Five independent digits A-E
    #[serde(rename = "5d")]
    FiveD,
}

impl GameType {
    pub fn all() -> [GameType; 3] {
        [GameType::Wingo, GameType::K3, GameType::FiveD]
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameType::Wingo => write!(f, "wingo"),
            GameType::K3 => write!(f, "k3"),
            GameType::FiveD => write!(f, "5d"),
        }
    }
}

impl FromStr for GameType {
    type Err = BetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wingo" => Ok(GameType::Wingo),
            "k3" => Ok(GameType::K3),
            "5d" | "fived" => Ok(GameType::FiveD),
            other => Err(BetError::UnknownGame(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SizeCategory {
    Big,
    Small,
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeCategory::Big => write!(f, "big"),
            SizeCategory::Small => write!(f, "small"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Odd,
    Even,
}

impl Parity {
    pub fn of(value: u32) -> Self {
        if value % 2 == 0 {
            Parity::Even
        } else {
            Parity::Odd
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::Odd => write!(f, "odd"),
            Parity::Even => write!(f, "even"),
        }
    }
}

/// Wingo color scheme
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Green,
    Violet,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Green => write!(f, "green"),
            Color::Violet => write!(f, "violet"),
        }
    }
}

/// What a bet is placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BetType {
    Number,
    Color,
    Size,
    Parity,
    Sum,
    Triple,
    AnyTriple,
    Pair,
    Different,
    Straight,
    /// 5D digit position, 0 = A .. 4 = E
    Position(u8),
}

pub const POSITION_LABELS: [&str; 5] = ["A", "B", "C", "D", "E"];

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetType::Number => write!(f, "number"),
            BetType::Color => write!(f, "color"),
            BetType::Size => write!(f, "size"),
            BetType::Parity => write!(f, "parity"),
            BetType::Sum => write!(f, "sum"),
            BetType::Triple => write!(f, "triple"),
            BetType::AnyTriple => write!(f, "any_triple"),
            BetType::Pair => write!(f, "pair"),
            BetType::Different => write!(f, "different"),
            BetType::Straight => write!(f, "straight"),
            BetType::Position(p) => match POSITION_LABELS.get(*p as usize) {
                Some(label) => write!(f, "{}", label),
                None => write!(f, "P{}", p),
            },
        }
    }
}

/// Concrete value of a bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BetValue {
    Digit(u8),
    Color(Color),
    Size(SizeCategory),
    Parity(Parity),
    /// Sorted distinct faces for three-different bets
    Faces([u8; 3]),
    Any,
}

impl fmt::Display for BetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetValue::Digit(d) => write!(f, "{}", d),
            BetValue::Color(c) => write!(f, "{}", c),
            BetValue::Size(s) => write!(f, "{}", s),
            BetValue::Parity(p) => write!(f, "{}", p),
            BetValue::Faces(faces) => write!(f, "{}{}{}", faces[0], faces[1], faces[2]),
            BetValue::Any => write!(f, "any"),
        }
    }
}

/// A `(betType, betValue)` winning-condition key.
///
/// The string form is `betType:betValue`, e.g. `color:red`, `sum:10`, `A:7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BetKey {
    pub bet_type: BetType,
    pub value: BetValue,
}

impl BetKey {
    pub const fn new(bet_type: BetType, value: BetValue) -> Self {
        Self { bet_type, value }
    }
}

impl fmt::Display for BetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bet_type, self.value)
    }
}

/// Split a `betType:betValue` string into its parts
pub fn split_key(raw: &str) -> Option<(&str, &str)> {
    let (bet_type, value) = raw.split_once(':')?;
    if bet_type.is_empty() || value.is_empty() {
        return None;
    }
    Some((bet_type, value))
}

/// One member of a game's result space.
///
/// `index` is the outcome's identity inside its space; `digits` holds the
/// game values (one digit for wingo, three faces for k3, five digits for 5d).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Outcome {
    pub game: GameType,
    pub index: u32,
    digits: [u8; 5],
    len: u8,
}

impl Outcome {
    pub fn new(game: GameType, index: u32, values: &[u8]) -> Self {
        let mut digits = [0u8; 5];
        let len = values.len().min(5);
        digits[..len].copy_from_slice(&values[..len]);
        Self {
            game,
            index,
            digits,
            len: len as u8,
        }
    }

    pub fn values(&self) -> &[u8] {
        &self.digits[..self.len as usize]
    }

    pub fn sum(&self) -> u32 {
        self.values().iter().map(|d| *d as u32).sum()
    }

    pub fn parity(&self) -> Parity {
        Parity::of(self.sum())
    }

    pub fn size(&self) -> SizeCategory {
        let big_from = match self.game {
            GameType::Wingo => 5,
            GameType::K3 => 11,
            GameType::FiveD => 23,
        };
        if self.sum() >= big_from {
            SizeCategory::Big
        } else {
            SizeCategory::Small
        }
    }

    /// Digit-concatenated label, e.g. `7`, `146`, `03921`
    pub fn label(&self) -> String {
        self.values().iter().map(|d| char::from(b'0' + d)).collect()
    }

    pub fn summary(&self) -> OutcomeSummary {
        OutcomeSummary {
            game: self.game,
            index: self.index,
            values: self.values().to_vec(),
            sum: self.sum(),
            size: self.size(),
            parity: self.parity(),
            colors: match self.game {
                GameType::Wingo => crate::games::wingo::colors_of(self.digits[0]).to_vec(),
                _ => Vec::new(),
            },
        }
    }
}

/// Strategy-agnostic external shape of a published outcome
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub game: GameType,
    pub index: u32,
    pub values: Vec<u8>,
    pub sum: u32,
    pub size: SizeCategory,
    pub parity: Parity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<Color>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_type_round_trip() {
        for game in GameType::all() {
            assert_eq!(game.to_string().parse::<GameType>().unwrap(), game);
        }
        assert!("roulette".parse::<GameType>().is_err());
    }

    #[test]
    fn test_bet_key_display() {
        let key = BetKey::new(BetType::Position(2), BetValue::Digit(7));
        assert_eq!(key.to_string(), "C:7");
        let key = BetKey::new(BetType::Different, BetValue::Faces([1, 3, 5]));
        assert_eq!(key.to_string(), "different:135");
        assert_eq!(split_key("color:red"), Some(("color", "red")));
        assert_eq!(split_key("color:"), None);
    }

    #[test]
    fn test_outcome_derived_fields() {
        let outcome = Outcome::new(GameType::FiveD, 99_999, &[9, 9, 9, 9, 9]);
        assert_eq!(outcome.sum(), 45);
        assert_eq!(outcome.size(), SizeCategory::Big);
        assert_eq!(outcome.parity(), Parity::Odd);
        assert_eq!(outcome.label(), "99999");

        let summary = Outcome::new(GameType::Wingo, 0, &[0]).summary();
        assert_eq!(summary.colors, vec![Color::Red, Color::Violet]);
        assert_eq!(summary.size, SizeCategory::Small);
    }
}
