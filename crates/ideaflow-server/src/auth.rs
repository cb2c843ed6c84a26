//! Bearer-token verification for the team channel.
//!
//! Tokens are pre-provisioned via configuration and stored as SHA-256
//! hashes; the plaintext never lives in memory past startup. Verification
//! distinguishes unknown tokens from expired ones so the WebSocket layer
//! can close with a distinct reason for each.

use std::collections::HashMap;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::TeamTokenSpec;

/// Token verification failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Token is not provisioned for this team.
    #[error("invalid credentials")]
    Invalid,

    /// Token was provisioned but its validity window has passed.
    #[error("expired credentials")]
    Expired,
}

/// A provisioned team credential, stored hashed.
#[derive(Debug, Clone)]
struct TeamToken {
    team_id: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Verifies bearer credentials presented at connect time.
pub struct TokenVerifier {
    /// Hash -> credential; lookups never touch plaintext.
    tokens: HashMap<String, TeamToken>,
}

impl TokenVerifier {
    /// Build a verifier from the configured credentials.
    pub fn new(specs: &[TeamTokenSpec]) -> Self {
        let now = Utc::now();
        let tokens = specs
            .iter()
            .map(|spec| {
                let expires_at = spec
                    .ttl
                    .and_then(|ttl| ChronoDuration::from_std(ttl).ok())
                    .map(|ttl| now + ttl);
                (
                    hash_token(&spec.token),
                    TeamToken {
                        team_id: spec.team_id.clone(),
                        expires_at,
                    },
                )
            })
            .collect();
        Self { tokens }
    }

    /// Verify a bearer token for a team.
    ///
    /// A token provisioned for a different team is `Invalid`, not a leak of
    /// which team it belongs to.
    pub fn verify(&self, team_id: &str, token: &str) -> Result<(), AuthError> {
        let entry = self.tokens.get(&hash_token(token)).ok_or(AuthError::Invalid)?;
        if entry.team_id != team_id {
            return Err(AuthError::Invalid);
        }
        if let Some(expires_at) = entry.expires_at {
            if Utc::now() >= expires_at {
                return Err(AuthError::Expired);
            }
        }
        Ok(())
    }

    /// Whether any credentials are provisioned at all.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Hash a token using SHA-256, hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn spec(team: &str, token: &str, ttl: Option<Duration>) -> TeamTokenSpec {
        TeamTokenSpec {
            team_id: team.to_string(),
            token: token.to_string(),
            ttl,
        }
    }

    #[test]
    fn test_accepts_provisioned_token() {
        let verifier = TokenVerifier::new(&[spec("team-1", "secret", None)]);
        assert_eq!(verifier.verify("team-1", "secret"), Ok(()));
    }

    #[test]
    fn test_rejects_unknown_token() {
        let verifier = TokenVerifier::new(&[spec("team-1", "secret", None)]);
        assert_eq!(verifier.verify("team-1", "wrong"), Err(AuthError::Invalid));
    }

    #[test]
    fn test_rejects_wrong_team() {
        let verifier = TokenVerifier::new(&[spec("team-1", "secret", None)]);
        assert_eq!(verifier.verify("team-2", "secret"), Err(AuthError::Invalid));
    }

    #[test]
    fn test_rejects_expired_token_distinctly() {
        let verifier = TokenVerifier::new(&[spec("team-1", "secret", Some(Duration::ZERO))]);
        assert_eq!(verifier.verify("team-1", "secret"), Err(AuthError::Expired));
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        assert_eq!(hash_token("abc").len(), 64);
    }
}
