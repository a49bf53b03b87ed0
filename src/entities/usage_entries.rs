use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "usage_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub employee_name: String,
    pub manager: String,
    pub tool: String,
    pub purpose: String,
    pub duration_minutes: i32,
    pub time_saved_minutes: i32,
    pub complexity_rating: i32,
    pub satisfaction_rating: i32,
    pub workflow_impact_rating: i32,
    pub result_outcome: String,
    pub notes: String,
    /// RFC 3339, microsecond precision; indexed.
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
