//! SQLite connection pool for the Local Store
//!
//! Opening a pool always leaves the database at [`SCHEMA_VERSION`]: the
//! schema script runs when `PRAGMA user_version` is behind and is skipped
//! otherwise.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use agrodrone_core::config::StorageConfig;

use crate::CacheError;

/// Schema revision written to `PRAGMA user_version`
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = include_str!("migrations/20260301_initial.sql");

/// File databases allow concurrent readers under WAL
const FILE_MAX_CONNECTIONS: u32 = 5;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle on the Local Store database
///
/// Cloning is cheap; clones share the same connections.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database file at `db_path`
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` if the directory or file cannot be
    /// created or opened, `CacheError::MigrationFailed` if the schema cannot
    /// be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "cannot create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(FILE_MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {}", db_path.display(), e))
            })?;

        let db = Self { pool };
        db.migrate().await?;
        info!(path = %db_path.display(), "Local store opened");
        Ok(db)
    }

    /// Opens the database named by the `storage` configuration section
    pub async fn from_config(config: &StorageConfig) -> Result<Self, CacheError> {
        Self::new(&config.database_path).await
    }

    /// Private in-memory database, used by tests
    ///
    /// Capped at one connection: every SQLite in-memory connection is its
    /// own database.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| CacheError::ConnectionFailed(format!("in-memory database: {}", e)))?;

        let db = Self { pool };
        db.migrate().await?;
        debug!("In-memory local store opened");
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Current value of `PRAGMA user_version`
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        schema_version(&self.pool).await
    }

    /// Closes every connection; later queries fail
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> Result<(), CacheError> {
        apply_schema(&self.pool).await
    }
}

async fn schema_version(pool: &SqlitePool) -> Result<i64, CacheError> {
    sqlx::query_scalar::<_, i64>("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(|e| CacheError::QueryFailed(format!("read schema version: {}", e)))
}

/// Brings the schema up to [`SCHEMA_VERSION`]
pub(crate) async fn apply_schema(pool: &SqlitePool) -> Result<(), CacheError> {
    let current = schema_version(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;
    if current >= SCHEMA_VERSION {
        debug!(version = current, "Schema up to date");
        return Ok(());
    }

    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("schema v{SCHEMA_VERSION}: {e}")))?;
    // PRAGMA does not accept bound parameters
    sqlx::raw_sql(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
        .execute(pool)
        .await
        .map_err(|e| CacheError::MigrationFailed(format!("set schema version: {e}")))?;

    info!(from = current, to = SCHEMA_VERSION, "Schema migrated");
    Ok(())
}
