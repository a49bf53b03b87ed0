//! Session token minting and verification.
//!
//! Tokens are HS256 JWTs. Verification is a pure function of the token,
//! the settings and the supplied clock, so it can be tested without a
//! running server.

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::{Role, User};

/// Why a token was rejected. Only surfaced in logs; clients see a generic
/// "not authenticated".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token audience mismatch")]
    AudienceMismatch,

    #[error("malformed token: {0}")]
    Malformed(String),
}

/// Signing material and claim policy.
#[derive(Clone)]
pub struct TokenSettings {
    secret: String,
    pub audience: String,
    pub issuer: String,
    pub ttl: TimeDelta,
}

impl TokenSettings {
    #[must_use]
    pub fn new(
        secret: impl Into<String>,
        audience: impl Into<String>,
        issuer: impl Into<String>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            secret: secret.into(),
            audience: audience.into(),
            issuer: issuer.into(),
            ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        let hours = i64::try_from(config.token_ttl_hours).unwrap_or(i64::MAX / 3600);
        Self::new(
            config.token_secret.clone(),
            config.audience.clone(),
            config.issuer.clone(),
            TimeDelta::try_hours(hours).unwrap_or(TimeDelta::MAX),
        )
    }
}

impl fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"<redacted>")
            .field("audience", &self.audience)
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    /// Display name, used to match entry ownership.
    pub name: String,
    pub role: Role,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.iat, 0).unwrap_or_default()
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }
}

/// Mint a token for `user`, valid from `issued_at` for `settings.ttl`.
pub fn issue_token(
    user: &User,
    settings: &TokenSettings,
    issued_at: DateTime<Utc>,
) -> Result<(String, Claims), TokenError> {
    let iat = issued_at.timestamp();
    let claims = Claims {
        sub: user.username.clone(),
        name: user.display_name.clone(),
        role: user.role,
        aud: settings.audience.clone(),
        iss: settings.issuer.clone(),
        iat,
        exp: iat.saturating_add(settings.ttl.num_seconds()),
        jti: Uuid::new_v4().to_string(),
    };

    let key = EncodingKey::from_secret(settings.secret.as_bytes());
    let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &key)
        .map_err(|e| TokenError::Malformed(format!("encode failed: {}", describe(e.kind()))))?;

    Ok((token, claims))
}

/// Check signature, audience and expiry of `token` at instant `now`.
///
/// The signature is checked first, so a forged token is never reported as
/// expired or mismatched.
pub fn verify_token(
    token: &str,
    settings: &TokenSettings,
    now: DateTime<Utc>,
) -> Result<Claims, TokenError> {
    let key = DecodingKey::from_secret(settings.secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked below against the injected clock.
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_audience(&[&settings.audience]);
    validation.set_issuer(&[&settings.issuer]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "aud", "iss"]);

    let claims = jsonwebtoken::decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::InvalidSignature
            }
            ErrorKind::InvalidAudience => TokenError::AudienceMismatch,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            kind => TokenError::Malformed(describe(kind)),
        })?;

    if now.timestamp() >= claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(claims)
}

/// Short description of a decode failure that never echoes key material.
fn describe(kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::InvalidIssuer => "issuer mismatch".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => format!("missing claim '{claim}'"),
        ErrorKind::InvalidToken => "not a JWT".to_string(),
        ErrorKind::Base64(_) => "bad encoding".to_string(),
        ErrorKind::Json(_) | ErrorKind::Utf8(_) => "bad claims".to_string(),
        _ => "rejected".to_string(),
    }
}
