use sea_orm_migration::prelude::*;

use crate::models::entry::backfill;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Columns introduced after the first release. Existing rows receive the
/// documented backfill value through the column default.
const ADDED: [(UsageEntries, &str, i32); 4] = [
    (
        UsageEntries::TimeSavedMinutes,
        "time_saved_minutes",
        backfill::TIME_SAVED_MINUTES,
    ),
    (
        UsageEntries::ComplexityRating,
        "complexity_rating",
        backfill::COMPLEXITY_RATING,
    ),
    (
        UsageEntries::SatisfactionRating,
        "satisfaction_rating",
        backfill::SATISFACTION_RATING,
    ),
    (
        UsageEntries::WorkflowImpactRating,
        "workflow_impact_rating",
        backfill::WORKFLOW_IMPACT_RATING,
    ),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (column, name, default) in ADDED {
            if manager.has_column("usage_entries", name).await? {
                continue;
            }
            manager
                .alter_table(
                    Table::alter()
                        .table(UsageEntries::Table)
                        .add_column(
                            ColumnDef::new(column)
                                .integer()
                                .not_null()
                                .default(default),
                        )
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (column, _, _) in ADDED {
            manager
                .alter_table(
                    Table::alter()
                        .table(UsageEntries::Table)
                        .drop_column(column)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum UsageEntries {
    Table,
    TimeSavedMinutes,
    ComplexityRating,
    SatisfactionRating,
    WorkflowImpactRating,
}
