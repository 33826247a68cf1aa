use std::{future::Future, time::Duration};

use chrono::{DateTime, FixedOffset};
use entity::activities;
use sea_orm::{
    ActiveValue::{NotSet, Set},
    ColumnTrait, DbErr, EntityTrait, QueryFilter,
    sea_query::Expr,
};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::DbPool;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("activity not found")]
    NotFound,
    /// The database refused the statement; carries the database's own message.
    #[error("{0}")]
    Rejected(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => Self::Unavailable(err.to_string()),
            _ => Self::Rejected(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Fields written on insert. `id` and `created_at` come from the database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewActivity {
    pub title: String,
    pub category: String,
    pub description: String,
    pub activity_date: DateTime<FixedOffset>,
    pub status: String,
}

/// Fields written on update. `status` is deliberately absent: updates leave it untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityChanges {
    pub title: String,
    pub category: String,
    pub description: String,
    pub activity_date: DateTime<FixedOffset>,
}

impl From<NewActivity> for ActivityChanges {
    fn from(value: NewActivity) -> Self {
        Self {
            title: value.title,
            category: value.category,
            description: value.description,
            activity_date: value.activity_date,
        }
    }
}

/// Data access for the `activities` table. Every call is bounded by `timeout`.
#[derive(Clone, Debug)]
pub struct ActivityStore {
    pool: DbPool,
    timeout: Duration,
}

impl ActivityStore {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// All rows in storage order.
    #[instrument(name = "store.activities.list", skip_all)]
    pub async fn list(&self) -> StoreResult<Vec<activities::Model>> {
        let rows = self
            .bounded(activities::Entity::find().all(&self.pool))
            .await?;
        debug!(count = rows.len(), "listed activities");
        Ok(rows)
    }

    #[instrument(name = "store.activities.create", skip_all)]
    pub async fn create(&self, activity: NewActivity) -> StoreResult<i32> {
        let model = activities::ActiveModel {
            id: NotSet,
            title: Set(activity.title),
            category: Set(activity.category),
            description: Set(activity.description),
            activity_date: Set(activity.activity_date),
            status: Set(activity.status),
            created_at: NotSet,
        };
        let inserted = self
            .bounded(activities::Entity::insert(model).exec(&self.pool))
            .await?;
        debug!(id = inserted.last_insert_id, "inserted activity");
        Ok(inserted.last_insert_id)
    }

    #[instrument(name = "store.activities.update", skip(self, changes))]
    pub async fn update(&self, id: i32, changes: ActivityChanges) -> StoreResult<()> {
        let result = self
            .bounded(
                activities::Entity::update_many()
                    .col_expr(activities::Column::Title, Expr::value(changes.title))
                    .col_expr(activities::Column::Category, Expr::value(changes.category))
                    .col_expr(
                        activities::Column::Description,
                        Expr::value(changes.description),
                    )
                    .col_expr(
                        activities::Column::ActivityDate,
                        Expr::value(changes.activity_date),
                    )
                    .filter(activities::Column::Id.eq(id))
                    .exec(&self.pool),
            )
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(name = "store.activities.delete", skip(self))]
    pub async fn delete(&self, id: i32) -> StoreResult<()> {
        let result = self
            .bounded(activities::Entity::delete_by_id(id).exec(&self.pool))
            .await?;
        if result.rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub async fn ping(&self) -> StoreResult<()> {
        self.bounded(self.pool.ping()).await
    }

    async fn bounded<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, DbErr>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Unavailable(format!(
                "database call exceeded {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}
