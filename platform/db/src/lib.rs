//! Database primitives: pool settings, pool construction and the activity store.

mod store;

use std::{fmt::Display, str::FromStr, time::Duration};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use thiserror::Error;
use tracing::info;

pub use store::{ActivityChanges, ActivityStore, NewActivity, StoreError, StoreResult};

/// Shared pool handle. sea-orm's connection wraps a sqlx pool and is cheap to clone.
pub type DbPool = DatabaseConnection;

const DATABASE_URL: &str = "DATABASE_URL";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (set {0})")]
    MissingUrl(&'static str),
    #[error("invalid value for {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
    #[error("failed to open database pool")]
    Connect(#[source] DbErr),
    #[error("database did not answer ping")]
    Ping(#[source] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Pool sizing and deadlines, read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    /// Idle floor kept open by the pool.
    pub min_connections: u32,
    /// Connections older than this are recycled.
    pub max_lifetime: Duration,
    pub connect_timeout: Duration,
    /// Deadline attached to every store call.
    pub statement_timeout: Duration,
    pub sql_logging: bool,
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            min_connections: 5,
            max_lifetime: Duration::from_secs(60 * 60),
            connect_timeout: Duration::from_secs(10),
            statement_timeout: Duration::from_secs(5),
            sql_logging: false,
        }
    }

    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        let url = lookup(DATABASE_URL)
            .filter(|value| !value.trim().is_empty())
            .ok_or(DbError::MissingUrl(DATABASE_URL))?;
        let mut settings = Self::new(url.trim());

        if let Some(value) = parse_setting(&lookup, "DB_MAX_CONNECTIONS")? {
            settings.max_connections = value;
        }
        if let Some(value) = parse_setting(&lookup, "DB_MIN_CONNECTIONS")? {
            settings.min_connections = value;
        }
        if let Some(secs) = parse_setting(&lookup, "DB_MAX_LIFETIME_SECS")? {
            settings.max_lifetime = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_setting(&lookup, "DB_CONNECT_TIMEOUT_SECS")? {
            settings.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_setting(&lookup, "DB_STATEMENT_TIMEOUT_SECS")? {
            settings.statement_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("DB_SQL_LOGGING") {
            settings.sql_logging = matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }

        if settings.max_connections == 0 {
            return Err(DbError::InvalidSetting {
                key: "DB_MAX_CONNECTIONS",
                reason: "must be at least 1".into(),
            });
        }
        if settings.min_connections > settings.max_connections {
            return Err(DbError::InvalidSetting {
                key: "DB_MIN_CONNECTIONS",
                reason: format!(
                    "{} exceeds DB_MAX_CONNECTIONS ({})",
                    settings.min_connections, settings.max_connections
                ),
            });
        }
        if settings.statement_timeout.is_zero() {
            return Err(DbError::InvalidSetting {
                key: "DB_STATEMENT_TIMEOUT_SECS",
                reason: "must be at least 1".into(),
            });
        }
        Ok(settings)
    }

    fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.url.clone());
        options
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .max_lifetime(self.max_lifetime)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.statement_timeout)
            .sqlx_logging(self.sql_logging);
        options
    }
}

fn parse_setting<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> DbResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| DbError::InvalidSetting {
                    key,
                    reason: format!("{raw:?}: {err}"),
                })
        })
        .transpose()
}

/// Open the pool and make sure the database answers before handing it out.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let pool = Database::connect(settings.connect_options())
        .await
        .map_err(DbError::Connect)?;
    pool.ping().await.map_err(DbError::Ping)?;
    info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        max_lifetime_secs = settings.max_lifetime.as_secs(),
        "database pool ready"
    );
    Ok(pool)
}
