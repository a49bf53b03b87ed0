use sea_orm_migration::prelude::*;

mod m20250601_create_usage_entries;
mod m20250615_add_rating_columns;
mod m20250620_add_users;
mod m20250701_import_legacy_entries;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_create_usage_entries::Migration),
            Box::new(m20250615_add_rating_columns::Migration),
            Box::new(m20250620_add_users::Migration),
            Box::new(m20250701_import_legacy_entries::Migration),
        ]
    }
}
