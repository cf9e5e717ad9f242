//! Five-digit game: positions A-E each 0-9, 100,000 outcomes.
//!
//! Outcome index is the five digits read as a decimal number, A first.

use crate::errors::BetError;
use crate::games::rules::GameRules;
use crate::games::types::{
    BetKey, BetType, BetValue, GameType, Outcome, Parity, SizeCategory, POSITION_LABELS,
};

pub const DIGIT_ODDS: f64 = 9.0;
pub const SIDE_ODDS: f64 = 2.0;
pub const POSITIONS: usize = 5;

const EXTREMES: [u32; 10] = [
    0, 99_999, 1_234, 12_345, 56_789, 98_765, 43_210, 55_555, 9, 90_000,
];

fn digit_size(digit: u8) -> SizeCategory {
    if digit >= 5 {
        SizeCategory::Big
    } else {
        SizeCategory::Small
    }
}

pub struct FiveDRules;

impl FiveDRules {
    fn parse_position(bet_type: &str) -> Option<u8> {
        POSITION_LABELS
            .iter()
            .position(|label| label.eq_ignore_ascii_case(bet_type.trim()))
            .map(|p| p as u8)
    }

    fn parse_side(value: &str) -> Option<BetValue> {
        match value {
            "big" => Some(BetValue::Size(SizeCategory::Big)),
            "small" => Some(BetValue::Size(SizeCategory::Small)),
            "odd" => Some(BetValue::Parity(Parity::Odd)),
            "even" => Some(BetValue::Parity(Parity::Even)),
            _ => None,
        }
    }

    fn side_values() -> [BetValue; 4] {
        [
            BetValue::Size(SizeCategory::Big),
            BetValue::Size(SizeCategory::Small),
            BetValue::Parity(Parity::Odd),
            BetValue::Parity(Parity::Even),
        ]
    }
}

impl GameRules for FiveDRules {
    fn game_type(&self) -> GameType {
        GameType::FiveD
    }

    fn space_size(&self) -> u32 {
        100_000
    }

    fn outcome(&self, index: u32) -> Outcome {
        let index = index % 100_000;
        let mut digits = [0u8; POSITIONS];
        let mut rest = index;
        for slot in digits.iter_mut().rev() {
            *slot = (rest % 10) as u8;
            rest /= 10;
        }
        Outcome::new(GameType::FiveD, index, &digits)
    }

    fn winning_conditions(&self, outcome: &Outcome) -> Vec<BetKey> {
        let mut keys = Vec::with_capacity(POSITIONS * 3 + 2);
        for (position, digit) in outcome.values().iter().enumerate() {
            let bet_type = BetType::Position(position as u8);
            keys.push(BetKey::new(bet_type, BetValue::Digit(*digit)));
            keys.push(BetKey::new(bet_type, BetValue::Size(digit_size(*digit))));
            keys.push(BetKey::new(bet_type, BetValue::Parity(Parity::of(*digit as u32))));
        }
        keys.push(BetKey::new(BetType::Sum, BetValue::Size(outcome.size())));
        keys.push(BetKey::new(BetType::Sum, BetValue::Parity(outcome.parity())));
        keys
    }

    fn parse_key(&self, bet_type: &str, bet_value: &str) -> Result<BetKey, BetError> {
        let invalid = || BetError::InvalidValue {
            bet_type: bet_type.to_string(),
            value: bet_value.to_string(),
        };
        let value = bet_value.trim().to_ascii_lowercase();

        if bet_type.trim().eq_ignore_ascii_case("sum") {
            let side = Self::parse_side(&value).ok_or_else(invalid)?;
            return Ok(BetKey::new(BetType::Sum, side));
        }

        let position = Self::parse_position(bet_type).ok_or_else(|| BetError::UnknownBetType {
            game: GameType::FiveD,
            bet_type: bet_type.to_string(),
        })?;
        let bet_type = BetType::Position(position);
        if let Some(side) = Self::parse_side(&value) {
            return Ok(BetKey::new(bet_type, side));
        }
        let digit: u8 = value.parse().map_err(|_| invalid())?;
        if digit > 9 {
            return Err(invalid());
        }
        Ok(BetKey::new(bet_type, BetValue::Digit(digit)))
    }

    fn odds(&self, key: &BetKey, outcome: &Outcome) -> Option<f64> {
        let wins = match (key.bet_type, key.value) {
            (BetType::Position(p), value) => {
                let digit = *outcome.values().get(p as usize)?;
                match value {
                    BetValue::Digit(d) => d == digit,
                    BetValue::Size(size) => size == digit_size(digit),
                    BetValue::Parity(parity) => parity == Parity::of(digit as u32),
                    _ => false,
                }
            }
            (BetType::Sum, BetValue::Size(size)) => size == outcome.size(),
            (BetType::Sum, BetValue::Parity(parity)) => parity == outcome.parity(),
            _ => false,
        };
        wins.then(|| self.nominal_odds(key))
    }

    fn nominal_odds(&self, key: &BetKey) -> f64 {
        match key.value {
            BetValue::Digit(_) => DIGIT_ODDS,
            _ => SIDE_ODDS,
        }
    }

    fn all_keys(&self) -> Vec<BetKey> {
        let mut keys = Vec::new();
        for position in 0..POSITIONS as u8 {
            let bet_type = BetType::Position(position);
            for digit in 0..10 {
                keys.push(BetKey::new(bet_type, BetValue::Digit(digit)));
            }
            for side in Self::side_values() {
                keys.push(BetKey::new(bet_type, side));
            }
        }
        for side in Self::side_values() {
            keys.push(BetKey::new(BetType::Sum, side));
        }
        keys
    }

    fn dimensions(&self) -> usize {
        POSITIONS
    }

    fn digit_key(&self, dimension: usize, digit: u8) -> Option<BetKey> {
        (dimension < POSITIONS && digit <= 9)
            .then(|| BetKey::new(BetType::Position(dimension as u8), BetValue::Digit(digit)))
    }

    fn extreme_outcomes(&self) -> Vec<u32> {
        EXTREMES.to_vec()
    }

    fn complementary_pairs(&self) -> Vec<(BetKey, BetKey)> {
        let mut pairs = Vec::new();
        let bet_types = (0..POSITIONS as u8)
            .map(BetType::Position)
            .chain(std::iter::once(BetType::Sum));
        for bet_type in bet_types {
            pairs.push((
                BetKey::new(bet_type, BetValue::Size(SizeCategory::Big)),
                BetKey::new(bet_type, BetValue::Size(SizeCategory::Small)),
            ));
            pairs.push((
                BetKey::new(bet_type, BetValue::Parity(Parity::Odd)),
                BetKey::new(bet_type, BetValue::Parity(Parity::Even)),
            ));
        }
        pairs
    }
}
