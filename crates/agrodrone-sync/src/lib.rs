//! AgroDrone Sync - Offline-first synchronization
//!
//! Provides:
//! - Upload-then-download full sync with per-table and per-record isolation
//! - Incremental downloads driven by per-table watermarks
//! - Offline-aware collection access for a single table
//! - Connectivity monitoring and sync-on-reconnect scheduling
//!
//! ## Modules
//!
//! - [`engine`] - [`SyncOrchestrator`], the full-sync state machine
//! - [`collection`] - [`OfflineCollection`], per-table read/write façade
//! - [`connectivity`] - [`ConnectivityMonitor`], probe-driven online state
//! - [`scheduler`] - [`ReconnectScheduler`], sync after connectivity returns
//! - [`notifier`] - [`LogNotifier`], notifications rendered as log events

pub mod collection;
pub mod connectivity;
pub mod engine;
pub mod notifier;
pub mod scheduler;

pub use collection::{CollectionSnapshot, OfflineCollection};
pub use connectivity::ConnectivityMonitor;
pub use engine::SyncOrchestrator;
pub use notifier::LogNotifier;
pub use scheduler::ReconnectScheduler;

use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The operation needs the remote store but the device is offline
    #[error("Device is offline")]
    Offline,

    /// No user is signed in
    #[error("No authenticated user")]
    NotAuthenticated,

    /// The Local Store failed; not retried automatically
    #[error("Storage error: {0}")]
    Storage(String),
}
