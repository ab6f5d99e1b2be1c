//! Local Store port (driven/secondary port)
//!
//! This module defines the interface for the on-device persistent store that
//! mirrors every synchronized table.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite today) and only matter to the caller as "the operation failed".
//! - Reads never fail on an empty result; they return an empty collection.
//! - `put` and `bulk_put` apply opposite [`MergePolicy`] values, which is
//!   the only difference between a local edit and a download.

use crate::domain::{MergePolicy, Record, RecordId, SyncQueueItem, TableName};

/// Secondary index lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexQuery {
    /// Records owned by the given user
    UserId(String),
    /// Records with the given sync flag
    Synced(bool),
}

impl IndexQuery {
    pub fn user_id(user_id: impl Into<String>) -> Self {
        IndexQuery::UserId(user_id.into())
    }

    /// Name of the index this query uses
    pub fn index_name(&self) -> &'static str {
        match self {
            IndexQuery::UserId(_) => "user_id",
            IndexQuery::Synced(_) => "synced",
        }
    }
}

/// Port trait for the on-device store
///
/// ## Implementation Notes
///
/// - `open` is idempotent and must be safe to call on every start-up.
/// - `put` generates an id when the record has none, stamps `updated_at`
///   with the current time and applies [`MergePolicy::LocalAuthoritative`].
/// - `bulk_put` applies [`MergePolicy::ServerAuthoritative`] and commits all
///   rows or none.
/// - `remove` and `clear` are idempotent.
#[async_trait::async_trait]
pub trait ILocalStore: Send + Sync {
    /// Creates every namespace if missing
    async fn open(&self) -> anyhow::Result<()>;

    async fn get_all(&self, table: TableName) -> anyhow::Result<Vec<Record>>;

    async fn get_by_id(&self, table: TableName, id: &RecordId) -> anyhow::Result<Option<Record>>;

    async fn get_by_index(&self, table: TableName, query: &IndexQuery)
        -> anyhow::Result<Vec<Record>>;

    /// Upserts a record written on this device and returns the stored copy
    async fn put(&self, table: TableName, record: Record) -> anyhow::Result<Record>;

    async fn remove(&self, table: TableName, id: &RecordId) -> anyhow::Result<()>;

    async fn clear(&self, table: TableName) -> anyhow::Result<()>;

    /// Writes server rows in a single transaction, returning the number stored
    async fn bulk_put(&self, table: TableName, records: Vec<Record>) -> anyhow::Result<usize>;

    async fn get_sync_metadata(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn set_sync_metadata(&self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Records whose local version has not been confirmed by the remote
    async fn get_unsynced_records(&self, table: TableName) -> anyhow::Result<Vec<Record>> {
        self.get_by_index(table, &IndexQuery::Synced(false)).await
    }

    /// Flips the sync flag to `true` without touching `updated_at`
    ///
    /// Only the version stamped `updated_at` is confirmed. Returns `false`
    /// when the record no longer exists locally or was written again since
    /// that version was read; such a record stays pending.
    async fn mark_as_synced(
        &self,
        table: TableName,
        id: &RecordId,
        updated_at: &str,
    ) -> anyhow::Result<bool>;

    // --- Sync queue ---

    async fn enqueue(&self, item: &SyncQueueItem) -> anyhow::Result<()>;

    /// Queued items in creation order
    async fn queued_items(&self) -> anyhow::Result<Vec<SyncQueueItem>>;

    async fn remove_queue_item(&self, id: &RecordId) -> anyhow::Result<()>;

    /// Increments the retry counter of a queued item
    async fn bump_retry(&self, id: &RecordId) -> anyhow::Result<()>;
}

/// Merge policy applied by [`ILocalStore::put`]
pub const PUT_POLICY: MergePolicy = MergePolicy::LocalAuthoritative;
/// Merge policy applied by [`ILocalStore::bulk_put`]
pub const BULK_PUT_POLICY: MergePolicy = MergePolicy::ServerAuthoritative;
