//! Bet normalization at ingestion.
//!
//! Upstream producers have used several names for the stake over time, and
//! some send amounts and values as strings. [`RawBet`] accepts all of them;
//! [`Bet`] is the single normalized record the rest of the engine sees.

use crate::errors::BetError;
use crate::games::{BetKey, GameRules};
use crate::round::RoundKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bet as received from the placement service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBet {
    #[serde(default, alias = "roundId", alias = "period", alias = "periodId")]
    pub round_id: Option<String>,

    #[serde(default, alias = "userId", alias = "user")]
    pub user_id: Option<Value>,

    #[serde(default, alias = "betType", alias = "type")]
    pub bet_type: Option<String>,

    #[serde(default, alias = "betValue", alias = "value", alias = "selection")]
    pub bet_value: Option<Value>,

    #[serde(
        default,
        alias = "bet_amount",
        alias = "betAmount",
        alias = "money",
        alias = "gross_amount"
    )]
    pub amount: Option<Value>,

    #[serde(default)]
    pub odds: Option<f64>,
}

impl RawBet {
    pub fn new(user_id: &str, bet_type: &str, bet_value: &str, amount: f64) -> Self {
        Self {
            round_id: None,
            user_id: Some(Value::from(user_id)),
            bet_type: Some(bet_type.to_string()),
            bet_value: Some(Value::from(bet_value)),
            amount: serde_json::Number::from_f64(amount).map(Value::Number),
            odds: None,
        }
    }

    pub fn for_round(mut self, round_id: impl Into<String>) -> Self {
        self.round_id = Some(round_id.into());
        self
    }
}

/// Normalized, immutable bet
#[derive(Debug, Clone, PartialEq)]
pub struct Bet {
    pub round: RoundKey,
    pub user_id: String,
    pub key: BetKey,
    pub gross_amount: f64,
    pub platform_fee_amount: f64,
    pub net_amount: f64,
    /// Multiplier quoted at placement
    pub odds: f64,
}

impl Bet {
    pub fn normalize(
        raw: &RawBet,
        round: &RoundKey,
        rules: &dyn GameRules,
        fee_rate: f64,
    ) -> Result<Self, BetError> {
        if let Some(bet_round) = raw.round_id.as_deref() {
            let bet_round = bet_round.trim();
            if bet_round != round.period_id && bet_round != round.to_string() {
                return Err(BetError::RoundMismatch {
                    expected: round.to_string(),
                    bet_round: bet_round.to_string(),
                });
            }
        }

        let user_id = raw
            .user_id
            .as_ref()
            .and_then(scalar_text)
            .ok_or(BetError::MissingField("user_id"))?;
        let bet_type = raw
            .bet_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(BetError::MissingField("bet_type"))?;
        let bet_value = raw
            .bet_value
            .as_ref()
            .and_then(scalar_text)
            .ok_or(BetError::MissingField("bet_value"))?;
        let gross_amount = parse_amount(raw.amount.as_ref())?;

        let key = rules.parse_key(bet_type, &bet_value)?;
        let platform_fee_amount = gross_amount * fee_rate;

        Ok(Self {
            round: round.clone(),
            user_id,
            key,
            gross_amount,
            platform_fee_amount,
            net_amount: gross_amount - platform_fee_amount,
            odds: rules.nominal_odds(&key),
        })
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Positive finite stake from a number or numeric string
pub fn parse_amount(value: Option<&Value>) -> Result<f64, BetError> {
    let value = value.ok_or(BetError::MissingField("amount"))?;
    let amount = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| BetError::InvalidAmount(n.to_string()))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| BetError::InvalidAmount(s.clone()))?,
        other => return Err(BetError::InvalidAmount(other.to_string())),
    };
    if !amount.is_finite() || amount <= 0.0 {
        return Err(BetError::InvalidAmount(value.to_string()));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::wingo::WingoRules;
    use crate::games::GameType;
    use serde_json::json;

    fn round() -> RoundKey {
        RoundKey::new(GameType::Wingo, 30, "202403150001", "default")
    }

    #[test]
    fn test_amount_aliases() {
        for field in ["amount", "bet_amount", "betAmount", "money", "gross_amount"] {
            let raw: RawBet = serde_json::from_value(json!({
                "userId": "u1",
                "betType": "number",
                "betValue": 7,
                field: "100",
            }))
            .unwrap();
            let bet = Bet::normalize(&raw, &round(), &WingoRules, 0.02).unwrap();
            assert_eq!(bet.gross_amount, 100.0, "{}", field);
            assert!((bet.net_amount - 98.0).abs() < 1e-9);
            assert!((bet.platform_fee_amount - 2.0).abs() < 1e-9);
            assert_eq!(bet.key.to_string(), "number:7");
        }
    }

    #[test]
    fn test_rejects_bad_amounts() {
        for amount in [json!("abc"), json!(-5), json!(0), json!("NaN"), json!("inf"), json!(null), json!([1])] {
            assert!(
                matches!(parse_amount(Some(&amount)), Err(BetError::InvalidAmount(_))),
                "{}",
                amount
            );
        }
        assert_eq!(parse_amount(None), Err(BetError::MissingField("amount")));
    }

    #[test]
    fn test_round_mismatch_and_missing_fields() {
        let raw = RawBet::new("u1", "color", "red", 10.0).for_round("202403150002");
        assert!(matches!(
            Bet::normalize(&raw, &round(), &WingoRules, 0.02),
            Err(BetError::RoundMismatch { .. })
        ));

        let raw = RawBet::new("u1", "color", "red", 10.0).for_round("202403150001");
        assert!(Bet::normalize(&raw, &round(), &WingoRules, 0.02).is_ok());

        let mut raw = RawBet::new("u1", "color", "red", 10.0);
        raw.user_id = None;
        assert_eq!(
            Bet::normalize(&raw, &round(), &WingoRules, 0.02),
            Err(BetError::MissingField("user_id"))
        );
    }
}
