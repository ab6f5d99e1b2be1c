//! Sync bookkeeping types
//!
//! Tallies and reports produced by a sync run, plus the tombstone entries
//! stored in the `sync_queue` namespace.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::RecordId;
use super::record::{now_timestamp, Record};
use super::table::TableName;

/// Upload outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTally {
    pub success: u64,
    pub failed: u64,
}

impl SyncTally {
    pub fn record_success(&mut self) {
        self.success += 1;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Total number of attempted uploads
    pub fn total(&self) -> u64 {
        self.success + self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn merge(&mut self, other: SyncTally) {
        self.success += other.success;
        self.failed += other.failed;
    }
}

/// Rows written into the Local Store by one download pass, per table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadSummary {
    pub tables: BTreeMap<TableName, usize>,
    /// Non-fatal per-table errors, as `"<table>: <message>"`
    pub errors: Vec<String>,
}

impl DownloadSummary {
    pub fn record(&mut self, table: TableName, rows: usize) {
        *self.tables.entry(table).or_default() += rows;
    }

    pub fn record_error(&mut self, table: TableName, message: impl Display) {
        self.errors.push(format!("{table}: {message}"));
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().sum()
    }
}

/// Everything a completed full sync reports back to its caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Unsynced records upserted to the remote
    pub uploaded: SyncTally,
    /// Queued deletes propagated to the remote
    #[serde(default)]
    pub deleted: SyncTally,
    pub downloaded: DownloadSummary,
    /// Non-fatal errors from both phases
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        self.uploaded.failed > 0 || self.deleted.failed > 0 || !self.errors.is_empty()
    }
}

/// Result of a `perform_full_sync` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another full sync held the lock; nothing was done
    SkippedInProgress,
    /// The device reported no connectivity; nothing was done
    SkippedOffline,
    /// An unexpected error aborted the run after the lock was taken
    Failed { message: String },
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            SyncOutcome::SkippedInProgress | SyncOutcome::SkippedOffline
        )
    }
}

// ============================================================================
// Sync queue
// ============================================================================

/// Kind of change recorded in the sync queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueOperation {
    Insert,
    Update,
    Delete,
}

impl QueueOperation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueueOperation::Insert => "insert",
            QueueOperation::Update => "update",
            QueueOperation::Delete => "delete",
        }
    }
}

impl Display for QueueOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueOperation {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(QueueOperation::Insert),
            "update" => Ok(QueueOperation::Update),
            "delete" => Ok(QueueOperation::Delete),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown queue operation: {other}"
            ))),
        }
    }
}

/// One entry of the `sync_queue` namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: RecordId,
    pub table: TableName,
    pub operation: QueueOperation,
    pub record_id: RecordId,
    /// Snapshot of the record at queue time, if one was available
    pub data: Option<Record>,
    pub created_at: String,
    pub retry_count: u32,
}

impl SyncQueueItem {
    /// Creates a tombstone for a record deleted while offline
    pub fn delete(table: TableName, record_id: RecordId, data: Option<Record>) -> Self {
        Self {
            id: RecordId::generate(),
            table,
            operation: QueueOperation::Delete,
            record_id,
            data,
            created_at: now_timestamp(),
            retry_count: 0,
        }
    }
}
