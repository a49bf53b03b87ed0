use sea_orm::{ConnectionTrait, EntityTrait, Statement};
use sea_orm_migration::prelude::*;

use crate::db::EntryRepository;
use crate::domain;
use crate::entities::prelude::UsageEntries;
use crate::storage::legacy::LegacyRow;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Table written by the pre-rewrite application. It had no primary key and
/// used display-style column names.
const LEGACY_TABLE: &str = "entries";

/// Legacy column names and the canonical column each one feeds.
const LEGACY_COLUMNS: [(&str, &str); 12] = [
    ("Name", "employee_name"),
    ("Manager", "manager"),
    ("AI_Tool", "tool"),
    ("Purpose", "purpose"),
    ("Duration", "duration_minutes"),
    ("Time_Without_AI", "time_without_ai"),
    ("Task_Complexity", "complexity_rating"),
    ("Satisfaction", "satisfaction_rating"),
    ("Workflow_Impact", "workflow_impact_rating"),
    ("Result_Outcome", "result_outcome"),
    ("Notes", "notes"),
    ("Timestamp", "created_at"),
];

/// Copies rows from the legacy `entries` table into `usage_entries`.
///
/// Rows are decoded by the same code the flat-file backend uses, so both
/// backends backfill and normalize a legacy row identically. The legacy
/// table is left in place.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if !manager.has_table(LEGACY_TABLE).await? {
            return Ok(());
        }

        let mut select = Vec::with_capacity(LEGACY_COLUMNS.len());
        for (index, &(legacy, _)) in LEGACY_COLUMNS.iter().enumerate() {
            if manager.has_column(LEGACY_TABLE, legacy).await? {
                select.push(format!("CAST(\"{legacy}\" AS TEXT) AS c{index}"));
            } else {
                select.push(format!("NULL AS c{index}"));
            }
        }

        let conn = manager.get_connection();
        let rows = conn
            .query_all(Statement::from_string(
                conn.get_database_backend(),
                format!(
                    "SELECT rowid AS legacy_rowid, {} FROM {LEGACY_TABLE} ORDER BY rowid",
                    select.join(", ")
                ),
            ))
            .await?;

        let migrated_at = domain::now();
        let mut imported = 0;
        for row in &rows {
            let rowid: i64 = row.try_get("", "legacy_rowid")?;
            let mut legacy = LegacyRow::new(format!("{LEGACY_TABLE} row {rowid}"));
            for (index, &(_, column)) in LEGACY_COLUMNS.iter().enumerate() {
                let value: Option<String> = row.try_get("", &format!("c{index}"))?;
                if let Some(value) = value {
                    legacy.set(column, &value);
                }
            }
            let (_, entry) = legacy.decode(migrated_at).map_err(to_db_err)?;

            // Ids come from the autoincrement key, in legacy row order.
            UsageEntries::insert(EntryRepository::active_fields(&entry))
                .exec(conn)
                .await?;
            imported += 1;
        }

        tracing::info!("Imported {imported} legacy usage entries from '{LEGACY_TABLE}'");

        Ok(())
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        Ok(())
    }
}

fn to_db_err(err: crate::storage::StorageError) -> DbErr {
    DbErr::Custom(err.to_string())
}
