use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use super::claims::Claims;
use super::rotation::SigningKey;
use crate::error::SigningError;

/// Issuer recorded in every token
pub const ISSUER: &str = "heracles";

/// Registered claims added to the identity claims at signing time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Identity claims
    #[serde(flatten)]
    pub claims: Claims,
    /// Issuer
    pub iss: String,
    /// Issued at, epoch seconds
    pub iat: i64,
    /// Expiry, epoch seconds
    pub exp: i64,
}

impl TokenClaims {
    /// Claims valid from `now` for `ttl`
    pub fn new(claims: Claims, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            claims,
            iss: ISSUER.to_owned(),
            iat: now.timestamp(),
            exp: token_expiry(now, ttl),
        }
    }
}

/// `exp` of a token issued at `now` for `ttl`, in whole epoch seconds
pub fn token_expiry(now: DateTime<Utc>, ttl: Duration) -> i64 {
    let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    now.timestamp().saturating_add(ttl)
}

/// Produces a signed token string
pub trait TokenSigner: Send + Sync {
    /// Sign `claims` with `key`
    ///
    /// # Errors
    ///
    /// [`SigningError`] when the key is unusable or encoding fails.
    fn sign(
        &self,
        claims: &Claims,
        key: &SigningKey,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, SigningError>;
}

/// HMAC-SHA256 JWT signer
#[derive(Debug, Clone, Copy, Default)]
pub struct Hs256Signer;

impl TokenSigner for Hs256Signer {
    fn sign(
        &self,
        claims: &Claims,
        key: &SigningKey,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, SigningError> {
        let secret = key.secret.expose_secret();
        if secret.is_empty() {
            return Err(SigningError::EmptyKey);
        }
        let token_claims = TokenClaims::new(claims.clone(), ttl, now);
        let token = encode(
            &Header::new(Algorithm::HS256),
            &token_claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::rotation::KeySlot;
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;

    fn key(secret: &str) -> SigningKey {
        SigningKey {
            slot: KeySlot::Current,
            secret: SecretString::from(secret),
        }
    }

    #[test]
    fn test_signed_token_verifies() {
        let claims = Claims {
            id: "u1".into(),
            orgs: vec!["acme".into()],
            teams: vec!["acme".into()],
            ..Claims::default()
        };
        let now = Utc::now();

        let token = Hs256Signer
            .sign(&claims, &key("secret"), Duration::from_secs(60), now)
            .unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        let decoded =
            decode::<TokenClaims>(&token, &DecodingKey::from_secret(b"secret"), &validation)
                .unwrap();

        assert_eq!(decoded.header.alg, Algorithm::HS256);
        assert_eq!(decoded.claims.claims, claims);
        assert_eq!(decoded.claims.exp - decoded.claims.iat, 60);
        assert_eq!(decoded.claims.iss, "heracles");
    }

    #[test]
    fn test_expiry_drops_sub_second_part() {
        let now = DateTime::from_timestamp(1_700_000_000, 999_000_000).unwrap();
        assert_eq!(token_expiry(now, Duration::from_millis(60_500)), 1_700_000_060);
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let err = Hs256Signer
            .sign(&Claims::default(), &key(""), Duration::from_secs(60), Utc::now())
            .unwrap_err();
        assert!(matches!(err, SigningError::EmptyKey));
    }
}
