//! Storage for trends, content candidates, posts and news items.
//!
//! Callers program against [`Repository`]. [`PgRepository`] is the Postgres
//! implementation; [`MemoryRepository`] keeps everything in process and is
//! used for local dry runs and tests.

use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

mod candidates;
mod memory;
mod news;
mod postgres;
mod posts;
mod repository;
mod trends;

pub use candidates::CandidateRow;
pub use memory::MemoryRepository;
pub use news::NewsItemRow;
pub use postgres::PgRepository;
pub use posts::{PostRow, PublishScheduleRow};
pub use repository::Repository;
pub use trends::TrendRow;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/trendcast-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &trendcast_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{entity} {id} cannot move to {to} (expected status {expected})")]
    InvalidTransition {
        entity: &'static str,
        id: i64,
        to: String,
        expected: String,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid stored value: {0}")]
    Decode(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<trendcast_core::CoreError> for DbError {
    fn from(e: trendcast_core::CoreError) -> Self {
        DbError::Decode(e.to_string())
    }
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // The _sqlx_migrations table does not exist on a fresh database; count it as zero.
    let applied_before: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    MIGRATOR.run(pool).await?;

    let applied_after: i64 =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

/// Open the repository selected by the configuration.
///
/// `memory://` URLs yield an empty [`MemoryRepository`]; anything else is
/// treated as a Postgres URL, connected, and migrated.
///
/// # Errors
///
/// Returns [`DbError`] if the pool cannot connect or migrations fail.
pub async fn open_repository(
    config: &trendcast_core::AppConfig,
) -> Result<Arc<dyn Repository>, DbError> {
    if config.uses_memory_store() {
        tracing::warn!("using in-memory store; nothing will be persisted across restarts");
        return Ok(Arc::new(MemoryRepository::new()));
    }

    let pool = connect_pool(&config.database_url, PoolConfig::from_app_config(config)).await?;
    let applied = run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "database migrations applied");
    }
    Ok(Arc::new(PgRepository::new(pool)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.min_connections, DEFAULT_MIN_CONNECTIONS);
        assert_eq!(config.acquire_timeout_secs, DEFAULT_ACQUIRE_TIMEOUT_SECS);
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = DbError::NotFound {
            entity: "candidate",
            id: 42,
        };
        assert_eq!(err.to_string(), "candidate 42 not found");
    }
}
