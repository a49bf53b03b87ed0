//! Token-based implementation of the `AuthService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::SecurityConfig;
use crate::models::{Capability, PasswordHash};
use crate::services::auth_service::{AuthError, AuthService, Identity, SessionToken};
use crate::services::credentials::CredentialStore;
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{TokenSettings, issue_token, verify_token};

pub struct TokenAuthService {
    credentials: Arc<dyn CredentialStore>,
    settings: TokenSettings,
    owner_only_edits: bool,
    /// Verified against when the username is unknown, so a miss costs the
    /// same as a wrong password.
    dummy_hash: PasswordHash,
}

impl TokenAuthService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        settings: TokenSettings,
        owner_only_edits: bool,
        security: &SecurityConfig,
    ) -> anyhow::Result<Self> {
        let dummy_hash = PasswordHash::new(hash_password(
            &uuid::Uuid::new_v4().to_string(),
            security,
        )?);

        Ok(Self {
            credentials,
            settings,
            owner_only_edits,
            dummy_hash,
        })
    }

    fn mint(&self, user: &crate::models::User) -> Result<SessionToken, AuthError> {
        let (token, claims) = issue_token(user, &self.settings, crate::domain::now())?;
        Ok(SessionToken::new(token, &claims))
    }
}

#[async_trait]
impl AuthService for TokenAuthService {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SessionToken, AuthError> {
        let username = username.trim();
        let record = self.credentials.find_by_username(username).await?;

        let (user, hash) = match record {
            Some(record) => (Some(record.user), record.password_hash),
            None => (None, self.dummy_hash.clone()),
        };

        let is_valid = verify_password(password, &hash).await?;

        match user {
            Some(user) if is_valid => {
                info!(username = %user.username, role = %user.role, "Login succeeded");
                self.mint(&user)
            }
            _ => {
                warn!(username, "Login failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = verify_token(token, &self.settings, crate::domain::now())?;
        Ok(Identity::from(claims))
    }

    async fn refresh(&self, token: &str) -> Result<SessionToken, AuthError> {
        let identity = self.verify(token)?;

        let record = self
            .credentials
            .find_by_username(&identity.username)
            .await?
            .ok_or_else(|| {
                warn!(username = %identity.username, "Refresh for a user that no longer exists");
                AuthError::InvalidCredentials
            })?;

        self.mint(&record.user)
    }

    fn authorize(&self, identity: &Identity, capability: Capability) -> bool {
        identity.role.allows(capability)
    }

    fn authorize_entry_mutation(
        &self,
        identity: &Identity,
        employee_name: &str,
    ) -> Result<(), AuthError> {
        if !self.authorize(identity, Capability::ModifyEntries) {
            return Err(AuthError::Forbidden(format!(
                "role '{}' may not modify entries",
                identity.role
            )));
        }

        if !self.owner_only_edits
            || self.authorize(identity, Capability::ModifyAnyEntry)
            || identity.owns(employee_name)
        {
            return Ok(());
        }

        Err(AuthError::Forbidden(
            "entries submitted by others can only be changed by an admin".to_string(),
        ))
    }
}
