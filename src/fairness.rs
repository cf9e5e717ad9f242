//! Verification tokens for published outcomes.
//!
//! The token is opaque to the engine: it binds the round, the outcome and the
//! publishing time so a result can later be checked against the record.

use crate::games::Outcome;
use crate::round::RoundKey;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub trait VerificationHasher: Send + Sync {
    fn token(&self, round: &RoundKey, outcome: &Outcome, resolved_at: DateTime<Utc>) -> String;
}

/// Keyed SHA-256 over the round identity and outcome digits
#[derive(Debug, Clone)]
pub struct Sha256Verifier {
    secret: Vec<u8>,
}

impl Sha256Verifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    pub fn verify(
        &self,
        token: &str,
        round: &RoundKey,
        outcome: &Outcome,
        resolved_at: DateTime<Utc>,
    ) -> bool {
        self.token(round, outcome, resolved_at) == token
    }
}

impl VerificationHasher for Sha256Verifier {
    fn token(&self, round: &RoundKey, outcome: &Outcome, resolved_at: DateTime<Utc>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(round.to_string().as_bytes());
        hasher.update(outcome.index.to_be_bytes());
        hasher.update(outcome.values());
        hasher.update(resolved_at.timestamp_millis().to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::GameType;
    use chrono::TimeZone;

    #[test]
    fn test_token_binds_round_and_outcome() {
        let verifier = Sha256Verifier::new("secret");
        let round = RoundKey::new(GameType::Wingo, 30, "202403150001", "default");
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 30).unwrap();
        let seven = Outcome::new(GameType::Wingo, 7, &[7]);
        let three = Outcome::new(GameType::Wingo, 3, &[3]);

        let token = verifier.token(&round, &seven, at);
        assert_eq!(token.len(), 64);
        assert!(verifier.verify(&token, &round, &seven, at));
        assert!(!verifier.verify(&token, &round, &three, at));
        assert_ne!(token, Sha256Verifier::new("other").token(&round, &seven, at));
    }
}
