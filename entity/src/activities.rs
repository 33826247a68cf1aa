use sea_orm::prelude::{DateTimeWithTimeZone, *};
use serde::Serialize;

/// A task or event record. `id` and `created_at` are assigned by the database.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    /// `TASK` or `EVENT`; only checked on write, so stored rows are read back verbatim.
    pub category: String,
    pub description: String,
    pub activity_date: DateTimeWithTimeZone,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
