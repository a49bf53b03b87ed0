use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::{BackendKind, CsvBackend, StorageBackend, StorageError};
use crate::config::StorageConfig;
use crate::db::Store;
use crate::domain::EntryId;
use crate::models::{ChoiceLists, NewUsageEntry, UsageEntry, UsageEntryPatch};

/// The single CRUD contract the application uses, independent of backend.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
}

impl Storage {
    /// Selects the backend named in `config`, connects to it and runs the
    /// one-time migration.
    pub async fn open(config: &StorageConfig, choices: Arc<ChoiceLists>) -> anyhow::Result<Self> {
        let kind = BackendKind::resolve(config.backend.as_deref(), config.strict_backend)?;

        let backend: Arc<dyn StorageBackend> = match kind {
            BackendKind::Sqlite => {
                let store = Store::with_pool_options(
                    &config.database_path,
                    config.max_db_connections,
                    config.min_db_connections,
                )
                .await?;
                Arc::new(store.entry_repo(choices))
            }
            BackendKind::Csv => Arc::new(CsvBackend::new(
                &config.csv_path,
                choices,
                Duration::from_millis(config.lock_timeout_ms),
            )),
        };

        let storage = Self::with_backend(backend);
        storage.migrate().await?;
        info!("Storage backend selected: {kind}");
        Ok(storage)
    }

    #[must_use]
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        self.backend.migrate().await
    }

    pub async fn create(&self, entry: NewUsageEntry) -> Result<UsageEntry, StorageError> {
        self.backend.create(entry).await
    }

    pub async fn read_all(&self) -> Result<Vec<UsageEntry>, StorageError> {
        self.backend.read_all().await
    }

    pub async fn read_by_id(&self, id: EntryId) -> Result<UsageEntry, StorageError> {
        self.backend.read_by_id(id).await
    }

    pub async fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<UsageEntry>, StorageError> {
        self.backend.read_since(since).await
    }

    pub async fn update(
        &self,
        id: EntryId,
        patch: UsageEntryPatch,
    ) -> Result<UsageEntry, StorageError> {
        self.backend.update(id, patch).await
    }

    pub async fn delete(&self, id: EntryId) -> Result<(), StorageError> {
        self.backend.delete(id).await
    }

    pub async fn count(&self) -> Result<u64, StorageError> {
        self.backend.count().await
    }

    /// Creates a new entry with the same user fields as `id`.
    ///
    /// The copy is a fresh submission, so it must pass full validation even
    /// where the source row carries backfilled or retired values.
    pub async fn duplicate(&self, id: EntryId) -> Result<UsageEntry, StorageError> {
        let source = self.backend.read_by_id(id).await?;
        self.backend.create(source.fields()).await
    }

    /// Entries submitted under any of `names`, in the backend's stable order.
    pub async fn read_by_owner(&self, names: &[&str]) -> Result<Vec<UsageEntry>, StorageError> {
        let mut rows = self.backend.read_all().await?;
        rows.retain(|row| names.iter().any(|name| row.is_owned_by(name)));
        Ok(rows)
    }
}
