use std::sync::Arc;
use tracing::info;

use crate::config::{Config, CredentialSource};
use crate::db::Store;
use crate::services::{
    AuthService, ConfigCredentialStore, CredentialStore, TokenAuthService, TokenSettings,
};
use crate::storage::Storage;

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub storage: Storage,

    pub auth: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let choices = Arc::new(config.choices.clone());
        let storage = Storage::open(&config.storage, choices).await?;

        let credentials: Arc<dyn CredentialStore> = match config.auth.credential_source {
            CredentialSource::Config => {
                let store = ConfigCredentialStore::new(&config.auth.users);
                info!("Loaded {} provisioned user(s) from config", store.len());
                Arc::new(store)
            }
            CredentialSource::Database => {
                let store = Store::with_pool_options(
                    &config.storage.database_path,
                    config.storage.max_db_connections,
                    config.storage.min_db_connections,
                )
                .await?;
                info!("Reading user records from the database");
                Arc::new(store.user_repo())
            }
        };

        let auth = TokenAuthService::new(
            credentials,
            TokenSettings::from_config(&config.auth),
            config.auth.owner_only_edits,
            &config.security,
        )?;

        Ok(Self {
            config: Arc::new(config),
            storage,
            auth: Arc::new(auth),
        })
    }
}
