//! SQLite implementation of ILocalStore
//!
//! Each logical table maps to one SQL table with the indexed columns broken
//! out and the full record kept as JSON.
//!
//! ## Type Mapping
//!
//! | Record field  | SQL column   | Strategy                                   |
//! |---------------|--------------|--------------------------------------------|
//! | `id`          | `id`         | TEXT primary key                           |
//! | `user_id`     | `user_id`    | TEXT, NULL for junction rows               |
//! | `synced`      | `synced`     | INTEGER 0/1, removed from `data`           |
//! | `updated_at`  | `updated_at` | RFC 3339 TEXT, also kept in `data`         |
//! | everything    | `data`       | serde_json object without `synced`         |

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use agrodrone_core::domain::record::now_timestamp;
use agrodrone_core::domain::{
    QueueOperation, Record, RecordId, SyncQueueItem, TableName, ALL_TABLES,
};
use agrodrone_core::ports::{ILocalStore, IndexQuery, BULK_PUT_POLICY, PUT_POLICY};

use crate::pool::apply_schema;
use crate::CacheError;

/// SQLite-based implementation of the Local Store port
///
/// All operations go through a connection pool. `bulk_put` is the only
/// multi-row write and runs inside a single transaction.
#[derive(Debug, Clone)]
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Column values for one row, ready to bind
struct StoredRow {
    id: String,
    user_id: Option<String>,
    synced: bool,
    updated_at: String,
    data: String,
}

impl StoredRow {
    /// Splits a record into its columns after `policy` has been applied
    fn from_record(table: TableName, record: &Record) -> Result<Self, CacheError> {
        let id = record.id().ok_or_else(|| CacheError::InvalidRecord {
            table: table.to_string(),
            reason: "record has no id".into(),
        })?;
        let updated_at = record
            .updated_at()
            .map(str::to_string)
            .ok_or_else(|| CacheError::InvalidRecord {
                table: table.to_string(),
                reason: format!("record {} has no updated_at", id),
            })?;
        let data = serde_json::to_string(&record.to_remote_payload())
            .map_err(|e| CacheError::SerializationError(format!("Failed to encode record: {}", e)))?;

        Ok(Self {
            id: id.to_string(),
            user_id: record.user_id().map(str::to_string),
            synced: record.is_synced(),
            updated_at,
            data,
        })
    }
}

fn upsert_sql(table: TableName) -> String {
    format!(
        "INSERT OR REPLACE INTO {} (id, user_id, synced, updated_at, data) \
         VALUES (?, ?, ?, ?, ?)",
        table.as_str()
    )
}

/// Reconstruct a Record from a table row
fn record_from_row(row: &SqliteRow) -> Result<Record, CacheError> {
    let data: String = row.get("data");
    let synced: bool = row.get("synced");

    let value: serde_json::Value = serde_json::from_str(&data)
        .map_err(|e| CacheError::SerializationError(format!("Invalid record JSON: {}", e)))?;
    let mut record = Record::from_value(value)
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;
    record.set_synced(synced);
    Ok(record)
}

/// Reconstruct a SyncQueueItem from a `sync_queue` row
fn queue_item_from_row(row: &SqliteRow) -> Result<SyncQueueItem, CacheError> {
    let id: String = row.get("id");
    let table_name: String = row.get("table_name");
    let operation: String = row.get("operation");
    let record_id: String = row.get("record_id");
    let data: Option<String> = row.get("data");
    let created_at: String = row.get("created_at");
    let retry_count: i64 = row.get("retry_count");

    let serialization = |e: agrodrone_core::domain::DomainError| {
        CacheError::SerializationError(e.to_string())
    };

    let data = match data {
        Some(raw) => {
            let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
                CacheError::SerializationError(format!("Invalid queued record JSON: {}", e))
            })?;
            Some(Record::from_value(value).map_err(serialization)?)
        }
        None => None,
    };

    Ok(SyncQueueItem {
        id: RecordId::new(id).map_err(serialization)?,
        table: TableName::from_str(&table_name).map_err(serialization)?,
        operation: QueueOperation::from_str(&operation).map_err(serialization)?,
        record_id: RecordId::new(record_id).map_err(serialization)?,
        data,
        created_at,
        retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
    })
}

// ============================================================================
// ILocalStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalStore for SqliteLocalStore {
    async fn open(&self) -> anyhow::Result<()> {
        apply_schema(&self.pool).await?;
        tracing::debug!(tables = ALL_TABLES.len(), "Local store opened");
        Ok(())
    }

    async fn get_all(&self, table: TableName) -> anyhow::Result<Vec<Record>> {
        let rows = sqlx::query(&format!(
            "SELECT data, synced FROM {} ORDER BY updated_at DESC",
            table.as_str()
        ))
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn get_by_id(&self, table: TableName, id: &RecordId) -> anyhow::Result<Option<Record>> {
        let row = sqlx::query(&format!(
            "SELECT data, synced FROM {} WHERE id = ?",
            table.as_str()
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(record_from_row(r)?)),
            None => Ok(None),
        }
    }

    async fn get_by_index(
        &self,
        table: TableName,
        query: &IndexQuery,
    ) -> anyhow::Result<Vec<Record>> {
        let sql = format!(
            "SELECT data, synced FROM {} WHERE {} = ? ORDER BY updated_at DESC",
            table.as_str(),
            query.index_name()
        );
        let rows = match query {
            IndexQuery::UserId(user_id) => {
                sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            IndexQuery::Synced(synced) => {
                sqlx::query(&sql)
                    .bind(*synced)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn put(&self, table: TableName, mut record: Record) -> anyhow::Result<Record> {
        if record.id().is_none() {
            record.set_id(&RecordId::generate());
        }
        record.set("updated_at", now_timestamp());
        PUT_POLICY.apply(&mut record);

        let row = StoredRow::from_record(table, &record)?;
        sqlx::query(&upsert_sql(table))
            .bind(&row.id)
            .bind(&row.user_id)
            .bind(row.synced)
            .bind(&row.updated_at)
            .bind(&row.data)
            .execute(&self.pool)
            .await?;

        tracing::trace!(%table, record_id = %row.id, synced = row.synced, "Stored record");
        Ok(record)
    }

    async fn remove(&self, table: TableName, id: &RecordId) -> anyhow::Result<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table.as_str()))
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        tracing::trace!(%table, record_id = %id, "Removed record");
        Ok(())
    }

    async fn clear(&self, table: TableName) -> anyhow::Result<()> {
        let result = sqlx::query(&format!("DELETE FROM {}", table.as_str()))
            .execute(&self.pool)
            .await?;

        tracing::debug!(%table, removed = result.rows_affected(), "Cleared table");
        Ok(())
    }

    async fn bulk_put(&self, table: TableName, records: Vec<Record>) -> anyhow::Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let sql = upsert_sql(table);
        let mut tx = self.pool.begin().await?;
        let mut written = 0usize;

        for mut record in records {
            BULK_PUT_POLICY.apply(&mut record);
            if record.updated_at().is_none() {
                record.set("updated_at", now_timestamp());
            }
            // an early return drops `tx`, which rolls back every row
            let row = StoredRow::from_record(table, &record)?;
            sqlx::query(&sql)
                .bind(&row.id)
                .bind(&row.user_id)
                .bind(row.synced)
                .bind(&row.updated_at)
                .bind(&row.data)
                .execute(&mut *tx)
                .await?;
            written += 1;
        }

        tx.commit().await?;
        tracing::debug!(%table, rows = written, "Bulk stored server records");
        Ok(written)
    }

    async fn get_sync_metadata(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM sync_metadata WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set_sync_metadata(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT OR REPLACE INTO sync_metadata (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_as_synced(
        &self,
        table: TableName,
        id: &RecordId,
        updated_at: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE {} SET synced = 1 WHERE id = ? AND updated_at = ?",
            table.as_str()
        ))
        .bind(id.as_str())
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn enqueue(&self, item: &SyncQueueItem) -> anyhow::Result<()> {
        let data = match &item.data {
            Some(record) => Some(
                serde_json::to_string(&record.to_remote_payload())
                    .map_err(|e| anyhow::anyhow!("Failed to serialize queued record: {}", e))?,
            ),
            None => None,
        };

        sqlx::query(
            "INSERT OR REPLACE INTO sync_queue \
             (id, table_name, operation, record_id, data, created_at, retry_count) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.id.as_str())
        .bind(item.table.as_str())
        .bind(item.operation.as_str())
        .bind(item.record_id.as_str())
        .bind(&data)
        .bind(&item.created_at)
        .bind(i64::from(item.retry_count))
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            table = %item.table,
            record_id = %item.record_id,
            operation = %item.operation,
            "Queued remote operation"
        );
        Ok(())
    }

    async fn queued_items(&self) -> anyhow::Result<Vec<SyncQueueItem>> {
        let rows = sqlx::query("SELECT * FROM sync_queue ORDER BY created_at ASC, rowid ASC")
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(queue_item_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    async fn remove_queue_item(&self, id: &RecordId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn bump_retry(&self, id: &RecordId) -> anyhow::Result<()> {
        sqlx::query("UPDATE sync_queue SET retry_count = retry_count + 1 WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
