//! Token issuer and validator
//!
//! Tokens are HS256 JWTs in compact form. The payload carries the session id
//! as `sid` and the absolute expiry as `exp` (unix seconds):
//!
//! ```text
//! {"typ":"JWT","alg":"HS256"} . {"sid":"<uuid>","exp":1700000000} . HMAC-SHA256
//! ```
//!
//! `jsonwebtoken` checks the signature before the claims are deserialized,
//! so a session id is never read out of an unverified token.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;

/// Reasons a presented token is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Not a token of the expected shape
    #[error("malformed token")]
    Malformed,

    /// Signature does not verify under the configured key
    #[error("token signature is invalid")]
    SignatureInvalid,

    /// Current time is at or past the embedded expiry
    #[error("token has expired")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => Self::SignatureInvalid,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed,
        }
    }
}

/// A freshly minted token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sid: Uuid,
    exp: i64,
}

/// Mints and verifies session tokens.
///
/// Built once at startup from [`AuthConfig`] and shared behind an `Arc`.
/// Rotating the signing key means building a new service, which invalidates
/// every token issued by the old one.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Create a token service from the auth configuration.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let ttl = i64::try_from(config.token_ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .context("Token time-to-live is out of range")?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(config.signing_key.as_bytes()),
            decoding: DecodingKey::from_secret(config.signing_key.as_bytes()),
            validation,
            ttl,
        })
    }

    /// Issue a token for `session_id`, valid for the configured TTL.
    pub fn issue(&self, session_id: Uuid) -> Result<IssuedToken> {
        self.issue_at(session_id, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<IssuedToken> {
        let exp = now
            .checked_add_signed(self.ttl)
            .context("Token expiry is out of range")?
            .timestamp();
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .context("Token expiry is out of range")?;

        let claims = Claims { sid: session_id, exp };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("Failed to sign token")?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate a token and return the session id it was minted for.
    pub fn validate(&self, token: &str) -> Result<Uuid, TokenError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token against the clock value `now`.
    ///
    /// The decoder also rejects tokens already past `exp` by the system
    /// clock, so `now` can only bring expiry forward.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, TokenError> {
        let claims =
            jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)?.claims;

        // Expired at exp, not only after it
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims.sid)
    }
}
