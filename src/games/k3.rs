//! Three-dice game, 216 ordered rolls.

use crate::errors::BetError;
use crate::games::rules::GameRules;
use crate::games::types::{BetKey, BetType, BetValue, GameType, Outcome, Parity, SizeCategory};

pub const SIZE_ODDS: f64 = 2.0;
pub const PARITY_ODDS: f64 = 2.0;
pub const TRIPLE_ODDS: f64 = 207.36;
pub const ANY_TRIPLE_ODDS: f64 = 34.56;
pub const PAIR_ODDS: f64 = 13.83;
pub const DIFFERENT_ODDS: f64 = 34.56;
pub const STRAIGHT_ODDS: f64 = 8.64;

/// Multiplier of an exact-total bet
pub fn sum_odds(total: u8) -> f64 {
    match total {
        3 | 18 => 207.36,
        4 | 17 => 69.12,
        5 | 16 => 34.56,
        6 | 15 => 20.74,
        7 | 14 => 13.83,
        8 | 13 => 9.88,
        9 | 12 => 8.3,
        _ => 7.68,
    }
}

fn sorted_faces(outcome: &Outcome) -> [u8; 3] {
    let v = outcome.values();
    let mut faces = [v[0], v[1], v[2]];
    faces.sort_unstable();
    faces
}

fn is_triple(faces: &[u8; 3]) -> bool {
    faces[0] == faces[2]
}

/// Face that appears exactly twice, if any
fn pair_face(faces: &[u8; 3]) -> Option<u8> {
    if is_triple(faces) {
        None
    } else if faces[0] == faces[1] || faces[1] == faces[2] {
        Some(faces[1])
    } else {
        None
    }
}

fn is_distinct(faces: &[u8; 3]) -> bool {
    faces[0] != faces[1] && faces[1] != faces[2]
}

fn is_straight(faces: &[u8; 3]) -> bool {
    is_distinct(faces) && faces[1] == faces[0] + 1 && faces[2] == faces[1] + 1
}

pub struct K3Rules;

impl K3Rules {
    fn parse_face(value: &str) -> Option<u8> {
        let face: u8 = value.parse().ok()?;
        (1..=6).contains(&face).then_some(face)
    }

    /// Accepts `11`/`111` style repeated faces as well as a single face
    fn parse_repeated(value: &str, times: usize) -> Option<u8> {
        if value.len() == times {
            let first = value.chars().next()?;
            if value.chars().all(|c| c == first) {
                return Self::parse_face(&first.to_string());
            }
        }
        Self::parse_face(value)
    }
}

impl GameRules for K3Rules {
    fn game_type(&self) -> GameType {
        GameType::K3
    }

    fn space_size(&self) -> u32 {
        216
    }

    fn outcome(&self, index: u32) -> Outcome {
        let index = index % 216;
        let d1 = (index / 36) as u8 + 1;
        let d2 = ((index / 6) % 6) as u8 + 1;
        let d3 = (index % 6) as u8 + 1;
        Outcome::new(GameType::K3, index, &[d1, d2, d3])
    }

    fn winning_conditions(&self, outcome: &Outcome) -> Vec<BetKey> {
        let faces = sorted_faces(outcome);
        let mut keys = vec![
            BetKey::new(BetType::Sum, BetValue::Digit(outcome.sum() as u8)),
            BetKey::new(BetType::Size, BetValue::Size(outcome.size())),
            BetKey::new(BetType::Parity, BetValue::Parity(outcome.parity())),
        ];
        if is_triple(&faces) {
            keys.push(BetKey::new(BetType::Triple, BetValue::Digit(faces[0])));
            keys.push(BetKey::new(BetType::AnyTriple, BetValue::Any));
        }
        if let Some(face) = pair_face(&faces) {
            keys.push(BetKey::new(BetType::Pair, BetValue::Digit(face)));
        }
        if is_distinct(&faces) {
            keys.push(BetKey::new(BetType::Different, BetValue::Faces(faces)));
        }
        if is_straight(&faces) {
            keys.push(BetKey::new(BetType::Straight, BetValue::Any));
        }
        keys
    }

    fn parse_key(&self, bet_type: &str, bet_value: &str) -> Result<BetKey, BetError> {
        let invalid = || BetError::InvalidValue {
            bet_type: bet_type.to_string(),
            value: bet_value.to_string(),
        };
        let value = bet_value.trim().to_ascii_lowercase();
        let key = match bet_type.trim().to_ascii_lowercase().as_str() {
            "sum" => {
                let total: u8 = value.parse().map_err(|_| invalid())?;
                if !(3..=18).contains(&total) {
                    return Err(invalid());
                }
                BetKey::new(BetType::Sum, BetValue::Digit(total))
            }
            "size" => match value.as_str() {
                "big" => BetKey::new(BetType::Size, BetValue::Size(SizeCategory::Big)),
                "small" => BetKey::new(BetType::Size, BetValue::Size(SizeCategory::Small)),
                _ => return Err(invalid()),
            },
            "parity" => match value.as_str() {
                "odd" => BetKey::new(BetType::Parity, BetValue::Parity(Parity::Odd)),
                "even" => BetKey::new(BetType::Parity, BetValue::Parity(Parity::Even)),
                _ => return Err(invalid()),
            },
            "triple" => {
                let face = Self::parse_repeated(&value, 3).ok_or_else(invalid)?;
                BetKey::new(BetType::Triple, BetValue::Digit(face))
            }
            "any_triple" => BetKey::new(BetType::AnyTriple, BetValue::Any),
            "pair" => {
                let face = Self::parse_repeated(&value, 2).ok_or_else(invalid)?;
                BetKey::new(BetType::Pair, BetValue::Digit(face))
            }
            "different" => {
                let mut faces = [0u8; 3];
                if value.len() != 3 {
                    return Err(invalid());
                }
                for (slot, c) in faces.iter_mut().zip(value.chars()) {
                    *slot = Self::parse_face(&c.to_string()).ok_or_else(invalid)?;
                }
                faces.sort_unstable();
                if !is_distinct(&faces) {
                    return Err(invalid());
                }
                BetKey::new(BetType::Different, BetValue::Faces(faces))
            }
            "straight" => BetKey::new(BetType::Straight, BetValue::Any),
            _ => {
                return Err(BetError::UnknownBetType {
                    game: GameType::K3,
                    bet_type: bet_type.to_string(),
                })
            }
        };
        Ok(key)
    }

    fn odds(&self, key: &BetKey, outcome: &Outcome) -> Option<f64> {
        let faces = sorted_faces(outcome);
        match (key.bet_type, key.value) {
            (BetType::Sum, BetValue::Digit(total)) if total as u32 == outcome.sum() => {
                Some(sum_odds(total))
            }
            (BetType::Size, BetValue::Size(size)) if size == outcome.size() => Some(SIZE_ODDS),
            (BetType::Parity, BetValue::Parity(parity)) if parity == outcome.parity() => {
                Some(PARITY_ODDS)
            }
            (BetType::Triple, BetValue::Digit(face)) if is_triple(&faces) && faces[0] == face => {
                Some(TRIPLE_ODDS)
            }
            (BetType::AnyTriple, _) if is_triple(&faces) => Some(ANY_TRIPLE_ODDS),
            (BetType::Pair, BetValue::Digit(face)) if pair_face(&faces) == Some(face) => {
                Some(PAIR_ODDS)
            }
            (BetType::Different, BetValue::Faces(wanted)) if is_distinct(&faces) && wanted == faces => {
                Some(DIFFERENT_ODDS)
            }
            (BetType::Straight, _) if is_straight(&faces) => Some(STRAIGHT_ODDS),
            _ => None,
        }
    }

    fn nominal_odds(&self, key: &BetKey) -> f64 {
        match (key.bet_type, key.value) {
            (BetType::Sum, BetValue::Digit(total)) => sum_odds(total),
            (BetType::Triple, _) => TRIPLE_ODDS,
            (BetType::AnyTriple, _) => ANY_TRIPLE_ODDS,
            (BetType::Pair, _) => PAIR_ODDS,
            (BetType::Different, _) => DIFFERENT_ODDS,
            (BetType::Straight, _) => STRAIGHT_ODDS,
            _ => SIZE_ODDS,
        }
    }

    fn all_keys(&self) -> Vec<BetKey> {
        let mut keys: Vec<BetKey> = (3..=18)
            .map(|t| BetKey::new(BetType::Sum, BetValue::Digit(t)))
            .collect();
        keys.push(BetKey::new(BetType::Size, BetValue::Size(SizeCategory::Big)));
        keys.push(BetKey::new(BetType::Size, BetValue::Size(SizeCategory::Small)));
        keys.push(BetKey::new(BetType::Parity, BetValue::Parity(Parity::Odd)));
        keys.push(BetKey::new(BetType::Parity, BetValue::Parity(Parity::Even)));
        for face in 1..=6 {
            keys.push(BetKey::new(BetType::Triple, BetValue::Digit(face)));
            keys.push(BetKey::new(BetType::Pair, BetValue::Digit(face)));
        }
        keys.push(BetKey::new(BetType::AnyTriple, BetValue::Any));
        for a in 1..=4u8 {
            for b in (a + 1)..=5 {
                for c in (b + 1)..=6 {
                    keys.push(BetKey::new(BetType::Different, BetValue::Faces([a, b, c])));
                }
            }
        }
        keys.push(BetKey::new(BetType::Straight, BetValue::Any));
        keys
    }

    fn dimensions(&self) -> usize {
        3
    }

    fn extreme_outcomes(&self) -> Vec<u32> {
        // 111 and 666
        vec![0, 215]
    }

    fn complementary_pairs(&self) -> Vec<(BetKey, BetKey)> {
        vec![
            (
                BetKey::new(BetType::Size, BetValue::Size(SizeCategory::Big)),
                BetKey::new(BetType::Size, BetValue::Size(SizeCategory::Small)),
            ),
            (
                BetKey::new(BetType::Parity, BetValue::Parity(Parity::Odd)),
                BetKey::new(BetType::Parity, BetValue::Parity(Parity::Even)),
            ),
        ]
    }
}
