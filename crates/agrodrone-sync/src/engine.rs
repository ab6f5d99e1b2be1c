//! Full-sync orchestration
//!
//! The [`SyncOrchestrator`] moves data between the Local Store and the
//! remote store in two strictly ordered phases.
//!
//! ## Sync Flow
//!
//! 1. **Upload** (push): queued deletes first, then every unsynced record of
//!    every table in [`ALL_TABLES`] order, each upserted by `id`
//! 2. **Download** (pull): owned tables filtered by user and watermark,
//!    then junction tables filtered by the parent ids held locally
//! 3. **Report**: one tally, one notification
//!
//! Failures are isolated: a bad record never aborts its table, and a bad
//! table never aborts its phase. Only Local Store failures outside those
//! loops end a run early, and they are reported as [`SyncOutcome::Failed`]
//! rather than returned.
//!
//! ## Re-entrancy
//!
//! A full sync requested while another one is running is dropped (not
//! queued). The lock lives in the orchestrator and is released by
//! [`SyncGuard`] on every exit path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context};
use tracing::{debug, error, info, warn};

use agrodrone_core::domain::record::cmp_timestamps;
use agrodrone_core::domain::{
    now_timestamp, DownloadSummary, QueueOperation, Record, SyncOutcome,
    SyncQueueItem, SyncReport, SyncTally, TableKind, TableName, UserId, ALL_TABLES,
    JUNCTION_TABLES, OWNED_TABLES,
};
use agrodrone_core::ports::{
    ILocalStore, INetworkStatus, INotificationService, IRemoteGateway, Notification,
    NotificationPriority, RowFilter, BULK_PUT_POLICY, PUT_POLICY,
};

use crate::SyncError;

// ============================================================================
// SyncGuard
// ============================================================================

/// Holds the orchestrator's sync lock until dropped
struct SyncGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SyncGuard<'a> {
    /// Takes the lock, or returns `None` if it is already held
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Counters from one upload pass
struct UploadTally {
    records: SyncTally,
    deletes: SyncTally,
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Bidirectional synchronization between the Local Store and the remote
///
/// ## Dependencies
///
/// - `local_store`: on-device tables, watermarks and the delete queue
/// - `remote`: row-level access to the hosted backend
/// - `network`: connectivity snapshot consulted before each run
/// - `notifier`: user-facing summary of each run
pub struct SyncOrchestrator {
    local_store: Arc<dyn ILocalStore>,
    remote: Arc<dyn IRemoteGateway>,
    network: Arc<dyn INetworkStatus>,
    notifier: Arc<dyn INotificationService>,
    /// Held for the duration of a full sync
    is_syncing: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        local_store: Arc<dyn ILocalStore>,
        remote: Arc<dyn IRemoteGateway>,
        network: Arc<dyn INetworkStatus>,
        notifier: Arc<dyn INotificationService>,
    ) -> Self {
        Self {
            local_store,
            remote,
            network,
            notifier,
            is_syncing: AtomicBool::new(false),
        }
    }

    /// Returns true while a full sync holds the lock
    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::Acquire)
    }

    // ========================================================================
    // Full sync
    // ========================================================================

    /// Runs upload then download for `user_id`
    ///
    /// Returns immediately with [`SyncOutcome::SkippedInProgress`] when
    /// another full sync is running and with [`SyncOutcome::SkippedOffline`]
    /// when the device reports no connectivity. Never returns an error:
    /// anything unexpected becomes [`SyncOutcome::Failed`] plus a critical
    /// notification.
    #[tracing::instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn perform_full_sync(&self, user_id: &UserId) -> SyncOutcome {
        let Some(_guard) = SyncGuard::acquire(&self.is_syncing) else {
            info!("Sync already in progress, request dropped");
            return SyncOutcome::SkippedInProgress;
        };

        if !self.network.is_online() {
            info!("Device offline, sync deferred");
            return SyncOutcome::SkippedOffline;
        }

        let start = Instant::now();
        info!("Starting full sync");

        match self.run_phases(user_id).await {
            Ok(mut report) => {
                report.duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    success = report.uploaded.success,
                    failed = report.uploaded.failed,
                    deleted = report.deleted.success,
                    downloaded = report.downloaded.total_rows(),
                    errors = report.errors.len(),
                    duration_ms = report.duration_ms,
                    "Full sync completed"
                );
                self.notify_upload_result(&report).await;
                SyncOutcome::Completed(report)
            }
            Err(e) => {
                let message = e.to_string();
                error!(error = %message, "Full sync failed");
                self.send_notification(
                    Notification::sync(
                        "Sync failed",
                        "Your data could not be synchronized. Changes are kept on this device.",
                    )
                    .with_priority(NotificationPriority::Critical),
                )
                .await;
                SyncOutcome::Failed { message }
            }
        }
    }

    async fn run_phases(&self, user_id: &UserId) -> Result<SyncReport, SyncError> {
        let mut errors = Vec::new();
        let upload = self.upload_pass(&mut errors).await?;
        let downloaded = self.download_pass(user_id).await;
        errors.extend(downloaded.errors.iter().cloned());

        Ok(SyncReport {
            uploaded: upload.records,
            deleted: upload.deletes,
            downloaded,
            errors,
            duration_ms: 0,
        })
    }

    /// Opens the Local Store and, when online, runs one download pass
    ///
    /// Returns `None` when the device is offline.
    ///
    /// # Errors
    /// Returns `SyncError::Storage` if the Local Store cannot be opened.
    #[tracing::instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn initialize_offline_data(
        &self,
        user_id: &UserId,
    ) -> Result<Option<DownloadSummary>, SyncError> {
        self.local_store
            .open()
            .await
            .map_err(|e| SyncError::Storage(format!("{e:#}")))?;

        if !self.network.is_online() {
            info!("Offline at start-up, using local data only");
            return Ok(None);
        }

        let summary = self.download_pass(user_id).await;
        info!(rows = summary.total_rows(), "Offline data initialized");
        Ok(Some(summary))
    }

    // ========================================================================
    // Upload phase
    // ========================================================================

    /// Pushes queued deletes and unsynced records to the remote
    ///
    /// The returned tally counts both kinds of change.
    ///
    /// # Errors
    /// Returns `SyncError::Storage` if the delete queue cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn sync_to_server(&self) -> Result<SyncTally, SyncError> {
        let mut errors = Vec::new();
        let upload = self.upload_pass(&mut errors).await?;
        let mut tally = upload.records;
        tally.merge(upload.deletes);
        Ok(tally)
    }

    async fn upload_pass(&self, errors: &mut Vec<String>) -> Result<UploadTally, SyncError> {
        info!(policy = %PUT_POLICY, "Starting upload phase");
        let deletes = self.drain_delete_queue().await?;
        let mut tally = SyncTally::default();

        for table in ALL_TABLES {
            let records = match self.local_store.get_unsynced_records(table).await {
                Ok(records) => records,
                Err(e) => {
                    let msg = format!("{table}: failed to read unsynced records: {e:#}");
                    warn!(%table, error = %format!("{e:#}"), "Skipping table in upload");
                    errors.push(msg);
                    continue;
                }
            };

            if records.is_empty() {
                continue;
            }
            debug!(%table, count = records.len(), "Uploading unsynced records");

            for record in &records {
                match self.upload_record(table, record).await {
                    Ok(()) => tally.record_success(),
                    Err(e) => {
                        warn!(
                            %table,
                            record_id = record.get_str("id").unwrap_or("<none>"),
                            error = %format!("{e:#}"),
                            "Record upload failed"
                        );
                        tally.record_failure();
                    }
                }
            }
        }

        info!(
            success = tally.success,
            failed = tally.failed,
            deleted = deletes.success,
            "Upload phase finished"
        );
        Ok(UploadTally {
            records: tally,
            deletes,
        })
    }

    async fn upload_record(&self, table: TableName, record: &Record) -> anyhow::Result<()> {
        let id = record
            .id()
            .ok_or_else(|| anyhow!("unsynced record has no id"))?;
        let version = record
            .updated_at()
            .ok_or_else(|| anyhow!("unsynced record {id} has no updated_at"))?;

        self.remote
            .upsert(table, &record.to_remote_payload())
            .await
            .with_context(|| format!("upsert {table}/{id}"))?;

        let confirmed = self
            .local_store
            .mark_as_synced(table, &id, version)
            .await
            .with_context(|| format!("mark {table}/{id} as synced"))?;
        if !confirmed {
            debug!(%table, record_id = %id, "Record changed or removed locally during upload");
        }
        Ok(())
    }

    /// Propagates tombstones left by offline deletes, oldest first
    async fn drain_delete_queue(&self) -> Result<SyncTally, SyncError> {
        let items = self
            .local_store
            .queued_items()
            .await
            .map_err(|e| SyncError::Storage(format!("{e:#}")))?;

        let mut tally = SyncTally::default();
        if items.is_empty() {
            return Ok(tally);
        }
        debug!(count = items.len(), "Draining delete queue");

        for item in &items {
            if item.operation != QueueOperation::Delete {
                warn!(
                    queue_id = %item.id,
                    operation = %item.operation,
                    "Ignoring queued entry that is not a delete"
                );
                continue;
            }

            match self.propagate_delete(item).await {
                Ok(()) => tally.record_success(),
                Err(e) => {
                    warn!(
                        table = %item.table,
                        record_id = %item.record_id,
                        error = %format!("{e:#}"),
                        "Queued delete failed"
                    );
                    if let Err(e) = self.local_store.bump_retry(&item.id).await {
                        warn!(queue_id = %item.id, error = %e, "Failed to bump retry count");
                    }
                    tally.record_failure();
                }
            }
        }

        Ok(tally)
    }

    async fn propagate_delete(&self, item: &SyncQueueItem) -> anyhow::Result<()> {
        self.remote
            .delete(item.table, &item.record_id)
            .await
            .with_context(|| format!("delete {}/{}", item.table, item.record_id))?;
        self.local_store
            .remove_queue_item(&item.id)
            .await
            .context("remove delete queue entry")?;
        debug!(table = %item.table, record_id = %item.record_id, "Queued delete propagated");
        Ok(())
    }

    // ========================================================================
    // Download phase
    // ========================================================================

    /// Pulls remote rows for `user_id` into the Local Store
    ///
    /// # Errors
    /// Returns `SyncError::Offline` when the device reports no connectivity.
    #[tracing::instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn sync_from_server(&self, user_id: &UserId) -> Result<DownloadSummary, SyncError> {
        if !self.network.is_online() {
            return Err(SyncError::Offline);
        }
        Ok(self.download_pass(user_id).await)
    }

    async fn download_pass(&self, user_id: &UserId) -> DownloadSummary {
        info!(policy = %BULK_PUT_POLICY, "Starting download phase");
        let mut summary = DownloadSummary::default();

        for table in OWNED_TABLES {
            match self.download_owned_table(table, user_id).await {
                Ok(rows) => {
                    if rows > 0 {
                        info!(%table, rows, "Downloaded remote rows");
                    }
                    summary.record(table, rows);
                }
                Err(e) => {
                    warn!(%table, error = %format!("{e:#}"), "Table download failed");
                    summary.record_error(table, format!("{e:#}"));
                }
            }
        }

        for table in JUNCTION_TABLES {
            match self.download_junction_table(table).await {
                Ok(rows) => summary.record(table, rows),
                Err(e) => {
                    warn!(%table, error = %format!("{e:#}"), "Junction table download failed");
                    summary.record_error(table, format!("{e:#}"));
                }
            }
        }

        info!(
            rows = summary.total_rows(),
            errors = summary.errors.len(),
            "Download phase finished"
        );
        summary
    }

    /// Incremental fetch of one owned table
    ///
    /// The watermark written afterwards is the time captured before the
    /// query, so rows changed while the query ran are fetched again next
    /// time. A failed fetch leaves the watermark untouched.
    async fn download_owned_table(&self, table: TableName, user_id: &UserId) -> anyhow::Result<usize> {
        let key = table.last_sync_key();
        let last_sync = self
            .local_store
            .get_sync_metadata(&key)
            .await
            .with_context(|| format!("read {key}"))?;

        let fetch_started = now_timestamp();
        let mut filter = RowFilter::new().eq("user_id", user_id.as_str());
        if let Some(since) = &last_sync {
            filter = filter.gte("updated_at", since.as_str());
        }

        let rows = self
            .remote
            .select(table, &filter)
            .await
            .with_context(|| format!("select {table}"))?;

        let written = if rows.is_empty() {
            0
        } else {
            self.local_store
                .bulk_put(table, rows)
                .await
                .with_context(|| format!("store {table} rows"))?
        };

        self.advance_watermark(&key, last_sync.as_deref(), &fetch_started)
            .await?;
        Ok(written)
    }

    /// Writes `candidate` unless the stored watermark is already later
    async fn advance_watermark(
        &self,
        key: &str,
        current: Option<&str>,
        candidate: &str,
    ) -> anyhow::Result<()> {
        let newer = current
            .map(|current| cmp_timestamps(candidate, current).is_gt())
            .unwrap_or(true);
        if !newer {
            debug!(key, current, candidate, "Watermark not advanced");
            return Ok(());
        }

        self.local_store
            .set_sync_metadata(key, candidate)
            .await
            .with_context(|| format!("write {key}"))
    }

    /// Full fetch of a junction table for every parent held locally
    async fn download_junction_table(&self, table: TableName) -> anyhow::Result<usize> {
        let TableKind::Junction {
            parent,
            foreign_key,
        } = table.kind()
        else {
            return Err(anyhow!("{table} is not a junction table"));
        };

        let parent_ids: Vec<String> = self
            .local_store
            .get_all(parent)
            .await
            .with_context(|| format!("read local {parent}"))?
            .iter()
            .filter_map(Record::id)
            .map(|id| id.as_str().to_string())
            .collect();

        if parent_ids.is_empty() {
            debug!(%table, %parent, "No local parents, skipping junction fetch");
            return Ok(0);
        }

        let rows = self
            .remote
            .select(table, &RowFilter::new().in_list(foreign_key, parent_ids))
            .await
            .with_context(|| format!("select {table}"))?;

        if rows.is_empty() {
            return Ok(0);
        }
        self.local_store
            .bulk_put(table, rows)
            .await
            .with_context(|| format!("store {table} rows"))
    }

    // ========================================================================
    // Pending work
    // ========================================================================

    /// Unsynced records per table; tables without pending rows are omitted
    pub async fn pending_by_table(&self) -> anyhow::Result<BTreeMap<TableName, usize>> {
        let mut pending = BTreeMap::new();
        for table in ALL_TABLES {
            let count = self
                .local_store
                .get_unsynced_records(table)
                .await
                .with_context(|| format!("count unsynced {table}"))?
                .len();
            if count > 0 {
                pending.insert(table, count);
            }
        }
        Ok(pending)
    }

    /// Unsynced records across all tables plus queued deletes
    pub async fn pending_count(&self) -> anyhow::Result<usize> {
        let records: usize = self.pending_by_table().await?.values().sum();
        let queued = self.local_store.queued_items().await?.len();
        Ok(records + queued)
    }

    /// Returns true as soon as one pending record or queued delete is found
    pub async fn has_pending_sync(&self) -> anyhow::Result<bool> {
        for table in ALL_TABLES {
            if !self.local_store.get_unsynced_records(table).await?.is_empty() {
                return Ok(true);
            }
        }
        Ok(!self.local_store.queued_items().await?.is_empty())
    }

    /// Stored download watermark of every owned table
    pub async fn watermarks(&self) -> anyhow::Result<Vec<(TableName, Option<String>)>> {
        let mut marks = Vec::with_capacity(OWNED_TABLES.len());
        for table in OWNED_TABLES {
            let value = self.local_store.get_sync_metadata(&table.last_sync_key()).await?;
            marks.push((table, value));
        }
        Ok(marks)
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    async fn notify_upload_result(&self, report: &SyncReport) {
        let (records, deletes) = (report.uploaded, report.deleted);
        if records.is_empty() && deletes.is_empty() {
            return;
        }

        let mut body = if records.failed + deletes.failed == 0 {
            format!("{} records uploaded.", records.success)
        } else {
            format!("{} uploaded, {} failed.", records.success, records.failed)
        };
        if !deletes.is_empty() {
            body.push_str(&format!(
                " {} deletions propagated, {} failed.",
                deletes.success, deletes.failed
            ));
        }

        let notification = if records.failed + deletes.failed == 0 {
            Notification::sync("Sync complete", body)
        } else {
            Notification::sync("Partial sync", body).with_priority(NotificationPriority::High)
        };
        self.send_notification(notification).await;
    }

    async fn send_notification(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(title = %notification.title, error = %e, "Failed to deliver notification");
        }
    }
}

// ============================================================================
// Unit tests
// ============================================================================
