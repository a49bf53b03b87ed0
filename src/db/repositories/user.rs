use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::users;
use crate::models::{PasswordHash, Role, User, UserRecord};
use crate::services::credentials::CredentialStore;

/// Read path over the `users` table. Rows are provisioned out-of-band.
pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: users::Model) -> Result<UserRecord> {
        let role: Role = model
            .role
            .parse()
            .map_err(|e| anyhow::anyhow!("user '{}': {e}", model.username))?;

        Ok(UserRecord {
            user: User {
                display_name: model
                    .display_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| model.username.clone()),
                username: model.username,
                role,
            },
            password_hash: PasswordHash::new(model.password_hash),
        })
    }
}

#[async_trait]
impl CredentialStore for UserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        user.map(Self::map_model).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Store;
    use sea_orm::{ActiveModelTrait, Set};

    #[tokio::test]
    async fn finds_provisioned_user_and_defaults_display_name() {
        let store = Store::new("sqlite::memory:").await.unwrap();
        let now = crate::domain::format_timestamp(&crate::domain::now());
        users::ActiveModel {
            username: Set("alice".to_string()),
            display_name: Set(None),
            password_hash: Set("$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaA".to_string()),
            role: Set("Editor".to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&store.conn)
        .await
        .unwrap();

        let repo = store.user_repo();
        let record = repo.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(record.user.role, Role::Editor);
        assert_eq!(record.user.display_name, "alice");

        assert!(repo.find_by_username("mallory").await.unwrap().is_none());
    }
}
