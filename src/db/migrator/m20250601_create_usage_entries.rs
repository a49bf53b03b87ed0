use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UsageEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UsageEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(UsageEntries::EmployeeName).string().not_null())
                    .col(ColumnDef::new(UsageEntries::Manager).string().not_null())
                    .col(ColumnDef::new(UsageEntries::Tool).string().not_null())
                    .col(ColumnDef::new(UsageEntries::Purpose).string().not_null())
                    .col(
                        ColumnDef::new(UsageEntries::DurationMinutes)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UsageEntries::ResultOutcome)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(
                        ColumnDef::new(UsageEntries::Notes)
                            .string()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(UsageEntries::CreatedAt).string().not_null())
                    .col(ColumnDef::new(UsageEntries::UpdatedAt).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_usage_entries_created_at")
                    .table(UsageEntries::Table)
                    .col(UsageEntries::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UsageEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UsageEntries {
    Table,
    Id,
    EmployeeName,
    Manager,
    Tool,
    Purpose,
    DurationMinutes,
    ResultOutcome,
    Notes,
    CreatedAt,
    UpdatedAt,
}
