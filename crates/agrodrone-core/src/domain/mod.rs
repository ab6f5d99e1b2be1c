//! Domain entities for offline-first synchronization
//!
//! - Newtypes for record and user identifiers
//! - The fixed catalogue of synchronized tables
//! - Schemaless records with the local-only `synced` flag
//! - Sync bookkeeping types (tallies, reports, queued deletes)
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod record;
pub mod sync;
pub mod table;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::{RecordId, UserId};
pub use record::{now_timestamp, MergePolicy, Record};
pub use sync::{
    DownloadSummary, QueueOperation, SyncOutcome, SyncQueueItem, SyncReport, SyncTally,
};
pub use table::{TableKind, TableName, ALL_TABLES, JUNCTION_TABLES, OWNED_TABLES};
