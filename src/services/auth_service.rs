//! Domain service for authentication and authorization.
//!
//! Handles login, stateless token verification and role checks.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{Capability, Role};
use crate::services::token::{Claims, TokenError};

/// Errors specific to authentication operations.
///
/// Every variant except `Internal` and `Forbidden` reaches clients as the
/// same generic 401.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid session token: {0}")]
    Token(#[from] TokenError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A verified principal, attached to the request by the session middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    /// Whether an entry submitted under `employee_name` belongs to this user.
    #[must_use]
    pub fn owns(&self, employee_name: &str) -> bool {
        let name = employee_name.trim();
        name.eq_ignore_ascii_case(self.display_name.trim())
            || name.eq_ignore_ascii_case(self.username.trim())
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        let expires_at = claims.expires_at();
        Self {
            username: claims.sub,
            display_name: claims.name,
            role: claims.role,
            expires_at,
        }
    }
}

/// A freshly minted token plus the facts it encodes.
#[derive(Debug, Clone, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub subject: String,
    pub role: Role,
    pub audience: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    #[must_use]
    pub fn new(token: String, claims: &Claims) -> Self {
        Self {
            token,
            subject: claims.sub.clone(),
            role: claims.role,
            audience: claims.aud.clone(),
            issued_at: claims.issued_at(),
            expires_at: claims.expires_at(),
        }
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and mints a session token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown user or a
    /// wrong password, without saying which.
    async fn authenticate(&self, username: &str, password: &str)
    -> Result<SessionToken, AuthError>;

    /// Verifies a token against the current time. Touches no storage.
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;

    /// Verifies `token` and mints a new one for the same user, picking up
    /// any role change since the old token was issued.
    async fn refresh(&self, token: &str) -> Result<SessionToken, AuthError>;

    /// Role-to-capability check.
    fn authorize(&self, identity: &Identity, capability: Capability) -> bool;

    /// Whether `identity` may create or change an entry submitted under
    /// `employee_name`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when the role is too weak or the
    /// entry belongs to someone else.
    fn authorize_entry_mutation(
        &self,
        identity: &Identity,
        employee_name: &str,
    ) -> Result<(), AuthError>;
}
