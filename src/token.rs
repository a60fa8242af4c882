//! Session tokens: HS256 JWTs bound to an email address

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SESSION_TTL_HOURS;
use crate::error::TokenError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies session tokens with the process-wide secret
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    pub fn issue(&self, email: &str) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue_at(email, Utc::now())
    }

    /// Signs a token as if it had been issued at `issued_at`
    pub fn issue_at(
        &self,
        email: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Returns the email embedded in a valid, unexpired token
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.email)
            .map_err(|e| {
                debug!(reason = %e, "rejected session token");
                TokenError::Invalid
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_round_trips_the_email() {
        let tokens = TokenService::new("secret");
        let token = tokens.issue("user@example.com").unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "user@example.com");
    }

    #[test]
    fn token_is_still_valid_just_before_expiry() {
        let tokens = TokenService::new("secret");
        let issued_at = Utc::now() - Duration::hours(6) + Duration::minutes(1);
        let token = tokens.issue_at("user@example.com", issued_at).unwrap();
        assert_eq!(tokens.verify(&token).unwrap(), "user@example.com");
    }

    #[test]
    fn token_older_than_six_hours_is_invalid() {
        let tokens = TokenService::new("secret");
        let issued_at = Utc::now() - Duration::hours(6) - Duration::seconds(1);
        let token = tokens.issue_at("user@example.com", issued_at).unwrap();
        assert_eq!(tokens.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn foreign_signature_and_garbage_are_invalid() {
        let ours = TokenService::new("secret");
        let theirs = TokenService::new("another-secret");
        let forged = theirs.issue("user@example.com").unwrap();

        assert_eq!(ours.verify(&forged), Err(TokenError::Invalid));
        assert_eq!(ours.verify("not-a-jwt"), Err(TokenError::Invalid));
        assert_eq!(ours.verify(""), Err(TokenError::Invalid));
    }
}
