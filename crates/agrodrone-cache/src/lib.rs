//! AgroDrone Cache - Local Store persistence
//!
//! SQLite-based on-device storage for:
//! - One table per synchronized entity, indexed by `user_id` and `synced`
//! - Download watermarks (`sync_metadata`)
//! - Queued remote operations (`sync_queue`)
//!
//! ## Architecture
//!
//! This crate implements the `ILocalStore` port from `agrodrone-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with schema setup
//! - [`SqliteLocalStore`] - Full `ILocalStore` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use agrodrone_cache::{DatabasePool, SqliteLocalStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/agrodrone/agrodrone.db")).await?;
//! let store = SqliteLocalStore::new(pool.pool().clone());
//! // Use store as ILocalStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod store;

pub use pool::DatabasePool;
pub use store::SqliteLocalStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of stored JSON failed
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A record cannot be stored as given (e.g. missing id in a bulk write)
    #[error("Invalid record for {table}: {reason}")]
    InvalidRecord { table: String, reason: String },
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
