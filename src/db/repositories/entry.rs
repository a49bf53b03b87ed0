use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{self, EntryId};
use crate::entities::{prelude::*, usage_entries};
use crate::models::{ChoiceLists, NewUsageEntry, UsageEntry, UsageEntryPatch};
use crate::storage::{BackendKind, StorageBackend, StorageError};

/// Embedded-database backend: one row per entry in `usage_entries`.
///
/// Every operation runs in its own transaction.
pub struct EntryRepository {
    conn: DatabaseConnection,
    choices: Arc<ChoiceLists>,
}

impl EntryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection, choices: Arc<ChoiceLists>) -> Self {
        Self { conn, choices }
    }

    // ========================================================================
    // Model Conversion Helpers
    // ========================================================================

    fn map_model(m: usage_entries::Model) -> Result<UsageEntry, StorageError> {
        let parse = |column: &str, raw: &str| {
            domain::parse_timestamp(raw).map_err(|e| {
                StorageError::Io(format!("entry {}: invalid {column} '{raw}': {e}", m.id))
            })
        };
        let created_at = parse("created_at", &m.created_at)?;
        let updated_at = parse("updated_at", &m.updated_at)?;

        Ok(UsageEntry {
            id: EntryId::new(m.id),
            employee_name: m.employee_name,
            manager: m.manager,
            tool: m.tool,
            purpose: m.purpose,
            duration_minutes: m.duration_minutes,
            time_saved_minutes: m.time_saved_minutes,
            complexity_rating: m.complexity_rating,
            satisfaction_rating: m.satisfaction_rating,
            workflow_impact_rating: m.workflow_impact_rating,
            result_outcome: m.result_outcome,
            notes: m.notes,
            created_at,
            updated_at,
        })
    }

    fn map_models(rows: Vec<usage_entries::Model>) -> Result<Vec<UsageEntry>, StorageError> {
        rows.into_iter().map(Self::map_model).collect()
    }

    pub(crate) fn active_fields(entry: &UsageEntry) -> usage_entries::ActiveModel {
        usage_entries::ActiveModel {
            employee_name: Set(entry.employee_name.clone()),
            manager: Set(entry.manager.clone()),
            tool: Set(entry.tool.clone()),
            purpose: Set(entry.purpose.clone()),
            duration_minutes: Set(entry.duration_minutes),
            time_saved_minutes: Set(entry.time_saved_minutes),
            complexity_rating: Set(entry.complexity_rating),
            satisfaction_rating: Set(entry.satisfaction_rating),
            workflow_impact_rating: Set(entry.workflow_impact_rating),
            result_outcome: Set(entry.result_outcome.clone()),
            notes: Set(entry.notes.clone()),
            created_at: Set(domain::format_timestamp(&entry.created_at)),
            updated_at: Set(domain::format_timestamp(&entry.updated_at)),
            ..Default::default()
        }
    }
}

#[async_trait]
impl StorageBackend for EntryRepository {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        use sea_orm_migration::MigratorTrait;

        crate::db::migrator::Migrator::up(&self.conn, None).await?;
        Ok(())
    }

    async fn create(&self, entry: NewUsageEntry) -> Result<UsageEntry, StorageError> {
        let fields = entry.validated(&self.choices)?;
        // The id placeholder is replaced by the autoincrement key.
        let draft = UsageEntry::from_new(EntryId::default(), fields, domain::now());

        let txn = self.conn.begin().await?;
        let inserted = UsageEntries::insert(Self::active_fields(&draft))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        let created = UsageEntry {
            id: EntryId::new(inserted.last_insert_id),
            ..draft
        };
        debug!(id = %created.id, "Created usage entry in database");
        Ok(created)
    }

    async fn read_all(&self) -> Result<Vec<UsageEntry>, StorageError> {
        let rows = UsageEntries::find()
            .order_by_asc(usage_entries::Column::Id)
            .all(&self.conn)
            .await?;
        Self::map_models(rows)
    }

    async fn read_by_id(&self, id: EntryId) -> Result<UsageEntry, StorageError> {
        let row = UsageEntries::find_by_id(id.value())
            .one(&self.conn)
            .await?
            .ok_or(StorageError::NotFound(id))?;
        Self::map_model(row)
    }

    async fn read_since(&self, since: DateTime<Utc>) -> Result<Vec<UsageEntry>, StorageError> {
        let rows = UsageEntries::find()
            .filter(usage_entries::Column::CreatedAt.gte(domain::format_timestamp(&since)))
            .order_by_asc(usage_entries::Column::CreatedAt)
            .order_by_asc(usage_entries::Column::Id)
            .all(&self.conn)
            .await?;
        Self::map_models(rows)
    }

    async fn update(
        &self,
        id: EntryId,
        patch: UsageEntryPatch,
    ) -> Result<UsageEntry, StorageError> {
        let txn = self.conn.begin().await?;

        let row = UsageEntries::find_by_id(id.value())
            .one(&txn)
            .await?
            .ok_or(StorageError::NotFound(id))?;
        let mut entry = Self::map_model(row)?;
        entry.apply(patch, &self.choices, domain::now())?;

        let mut active = Self::active_fields(&entry);
        active.id = Set(id.value());
        active.update(&txn).await?;
        txn.commit().await?;

        Ok(entry)
    }

    async fn delete(&self, id: EntryId) -> Result<(), StorageError> {
        let txn = self.conn.begin().await?;
        let result = UsageEntries::delete_by_id(id.value()).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(StorageError::NotFound(id));
        }
        txn.commit().await?;

        debug!(id = %id, "Deleted usage entry from database");
        Ok(())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(UsageEntries::find().count(&self.conn).await?)
    }
}
