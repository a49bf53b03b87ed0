//! Read path over provisioned user records.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::config::UserSeed;
use crate::models::{PasswordHash, User, UserRecord};

/// Looks up users by username. Provisioning happens elsewhere.
///
/// Records carry the password hash; only the auth service consumes them.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>>;
}

/// Users listed under `[[auth.users]]` in the config file.
pub struct ConfigCredentialStore {
    users: HashMap<String, UserRecord>,
}

impl ConfigCredentialStore {
    #[must_use]
    pub fn new(seeds: &[UserSeed]) -> Self {
        let users = seeds
            .iter()
            .map(|seed| {
                let display_name = seed
                    .display_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or(&seed.username)
                    .to_string();
                let record = UserRecord {
                    user: User {
                        username: seed.username.clone(),
                        display_name,
                        role: seed.role,
                    },
                    password_hash: PasswordHash::new(seed.password_hash.clone()),
                };
                (seed.username.clone(), record)
            })
            .collect();

        Self { users }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for ConfigCredentialStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[tokio::test]
    async fn looks_up_seeded_users() {
        let store = ConfigCredentialStore::new(&[
            UserSeed {
                username: "alice".to_string(),
                display_name: Some("Alice Wonderland".to_string()),
                password_hash: "$argon2id$a".to_string(),
                role: Role::Editor,
            },
            UserSeed {
                username: "root".to_string(),
                display_name: Some("  ".to_string()),
                password_hash: "$argon2id$b".to_string(),
                role: Role::Admin,
            },
        ]);
        assert_eq!(store.len(), 2);

        let alice = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(alice.user.display_name, "Alice Wonderland");

        let root = store.find_by_username("root").await.unwrap().unwrap();
        assert_eq!(root.user.display_name, "root");
        assert_eq!(root.user.role, Role::Admin);

        assert!(store.find_by_username("mallory").await.unwrap().is_none());
        assert!(store.find_by_username("Alice").await.unwrap().is_none());
    }
}
