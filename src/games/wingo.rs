//! Color/number game: a single digit 0-9.
//!
//! 0 is red+violet, 5 is green+violet, other odd digits are green and other
//! even digits are red. A color bet pays less when the digit is one of the two
//! mixed outcomes.

use crate::errors::BetError;
use crate::games::rules::GameRules;
use crate::games::types::{BetKey, BetType, BetValue, Color, GameType, Outcome, SizeCategory};

pub const NUMBER_ODDS: f64 = 9.0;
pub const PURE_COLOR_ODDS: f64 = 2.0;
pub const MIXED_COLOR_ODDS: f64 = 1.5;
pub const VIOLET_ODDS: f64 = 4.5;
pub const SIZE_ODDS: f64 = 2.0;

pub fn colors_of(digit: u8) -> &'static [Color] {
    match digit {
        0 => &[Color::Red, Color::Violet],
        5 => &[Color::Green, Color::Violet],
        d if d % 2 == 1 => &[Color::Green],
        _ => &[Color::Red],
    }
}

fn is_mixed(digit: u8) -> bool {
    digit == 0 || digit == 5
}

pub struct WingoRules;

impl GameRules for WingoRules {
    fn game_type(&self) -> GameType {
        GameType::Wingo
    }

    fn space_size(&self) -> u32 {
        10
    }

    fn outcome(&self, index: u32) -> Outcome {
        Outcome::new(GameType::Wingo, index, &[(index % 10) as u8])
    }

    fn winning_conditions(&self, outcome: &Outcome) -> Vec<BetKey> {
        let digit = outcome.values()[0];
        let mut keys = vec![BetKey::new(BetType::Number, BetValue::Digit(digit))];
        for color in colors_of(digit) {
            keys.push(BetKey::new(BetType::Color, BetValue::Color(*color)));
        }
        keys.push(BetKey::new(BetType::Size, BetValue::Size(outcome.size())));
        keys
    }

    fn parse_key(&self, bet_type: &str, bet_value: &str) -> Result<BetKey, BetError> {
        let invalid = || BetError::InvalidValue {
            bet_type: bet_type.to_string(),
            value: bet_value.to_string(),
        };
        let value = bet_value.trim().to_ascii_lowercase();
        match bet_type.trim().to_ascii_lowercase().as_str() {
            "number" => {
                let digit: u8 = value.parse().map_err(|_| invalid())?;
                if digit > 9 {
                    return Err(invalid());
                }
                Ok(BetKey::new(BetType::Number, BetValue::Digit(digit)))
            }
            "color" => {
                let color = match value.as_str() {
                    "red" => Color::Red,
                    "green" => Color::Green,
                    "violet" => Color::Violet,
                    _ => return Err(invalid()),
                };
                Ok(BetKey::new(BetType::Color, BetValue::Color(color)))
            }
            "size" => {
                let size = match value.as_str() {
                    "big" => SizeCategory::Big,
                    "small" => SizeCategory::Small,
                    _ => return Err(invalid()),
                };
                Ok(BetKey::new(BetType::Size, BetValue::Size(size)))
            }
            _ => Err(BetError::UnknownBetType {
                game: GameType::Wingo,
                bet_type: bet_type.to_string(),
            }),
        }
    }

    fn odds(&self, key: &BetKey, outcome: &Outcome) -> Option<f64> {
        let digit = outcome.values()[0];
        match (key.bet_type, key.value) {
            (BetType::Number, BetValue::Digit(d)) if d == digit => Some(NUMBER_ODDS),
            (BetType::Color, BetValue::Color(Color::Violet)) if is_mixed(digit) => {
                Some(VIOLET_ODDS)
            }
            (BetType::Color, BetValue::Color(color))
                if color != Color::Violet && colors_of(digit).contains(&color) =>
            {
                if is_mixed(digit) {
                    Some(MIXED_COLOR_ODDS)
                } else {
                    Some(PURE_COLOR_ODDS)
                }
            }
            (BetType::Size, BetValue::Size(size)) if size == outcome.size() => Some(SIZE_ODDS),
            _ => None,
        }
    }

    fn nominal_odds(&self, key: &BetKey) -> f64 {
        match (key.bet_type, key.value) {
            (BetType::Number, _) => NUMBER_ODDS,
            (BetType::Color, BetValue::Color(Color::Violet)) => VIOLET_ODDS,
            (BetType::Color, _) => PURE_COLOR_ODDS,
            _ => SIZE_ODDS,
        }
    }

    fn all_keys(&self) -> Vec<BetKey> {
        let mut keys: Vec<BetKey> = (0..10)
            .map(|d| BetKey::new(BetType::Number, BetValue::Digit(d)))
            .collect();
        for color in [Color::Red, Color::Green, Color::Violet] {
            keys.push(BetKey::new(BetType::Color, BetValue::Color(color)));
        }
        for size in [SizeCategory::Big, SizeCategory::Small] {
            keys.push(BetKey::new(BetType::Size, BetValue::Size(size)));
        }
        keys
    }

    fn digit_key(&self, dimension: usize, digit: u8) -> Option<BetKey> {
        (dimension == 0 && digit <= 9).then(|| BetKey::new(BetType::Number, BetValue::Digit(digit)))
    }

    fn complementary_pairs(&self) -> Vec<(BetKey, BetKey)> {
        vec![(
            BetKey::new(BetType::Size, BetValue::Size(SizeCategory::Big)),
            BetKey::new(BetType::Size, BetValue::Size(SizeCategory::Small)),
        )]
    }
}
