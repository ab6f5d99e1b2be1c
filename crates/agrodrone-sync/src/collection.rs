//! Offline-aware access to a single table
//!
//! [`OfflineCollection`] keeps an in-memory view of one table for the
//! current user and routes every read and write to the remote store or the
//! Local Store depending on connectivity at call time.
//!
//! The view is published on a `tokio::sync::watch` channel so any number
//! of observers can react to changes:
//!
//! ```rust,ignore
//! let collection = OfflineCollection::new(TableName::Products, store, remote, network, session);
//! let mut rx = collection.subscribe();
//! collection.refresh().await;
//! rx.changed().await?;
//! println!("{} products", rx.borrow().records.len());
//! ```

use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use agrodrone_core::config::SyncConfig;
use agrodrone_core::domain::record::SYNCED_FIELD;
use agrodrone_core::domain::{now_timestamp, Record, RecordId, SyncQueueItem, TableName, UserId};
use agrodrone_core::ports::{
    IAuthSession, ILocalStore, INetworkStatus, IRemoteGateway, IndexQuery, RowFilter,
};

/// Published state of a collection
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CollectionSnapshot {
    pub records: Vec<Record>,
    pub is_loading: bool,
    /// Message of the last failed remote read, cleared on the next refresh
    pub error: Option<String>,
}

impl Default for CollectionSnapshot {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            is_loading: true,
            error: None,
        }
    }
}

/// Per-table façade over the Local Store and the remote store
pub struct OfflineCollection {
    table: TableName,
    local_store: Arc<dyn ILocalStore>,
    remote: Arc<dyn IRemoteGateway>,
    network: Arc<dyn INetworkStatus>,
    session: Arc<dyn IAuthSession>,
    queue_offline_deletes: bool,
    state: watch::Sender<CollectionSnapshot>,
}

impl OfflineCollection {
    pub fn new(
        table: TableName,
        local_store: Arc<dyn ILocalStore>,
        remote: Arc<dyn IRemoteGateway>,
        network: Arc<dyn INetworkStatus>,
        session: Arc<dyn IAuthSession>,
    ) -> Self {
        let (state, _) = watch::channel(CollectionSnapshot::default());
        Self {
            table,
            local_store,
            remote,
            network,
            session,
            queue_offline_deletes: false,
            state,
        }
    }

    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.queue_offline_deletes = config.queue_offline_deletes;
        self
    }

    pub fn with_queued_deletes(mut self, enabled: bool) -> Self {
        self.queue_offline_deletes = enabled;
        self
    }

    pub fn table(&self) -> TableName {
        self.table
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<CollectionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> CollectionSnapshot {
        self.state.borrow().clone()
    }

    pub fn records(&self) -> Vec<Record> {
        self.state.borrow().records.clone()
    }

    // ========================================================================
    // refresh
    // ========================================================================

    /// Reloads the view for the current user
    ///
    /// Online, rows come from the remote (newest `created_at` first) and are
    /// mirrored into the Local Store as synced. Offline, or when the remote
    /// read fails, rows come from the Local Store's `user_id` index. The
    /// remote failure is kept in [`CollectionSnapshot::error`]. Without a
    /// signed-in user this does nothing.
    pub async fn refresh(&self) -> CollectionSnapshot {
        let user = match self.session.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!(table = %self.table, "No authenticated user, refresh skipped");
                return self.snapshot();
            }
            Err(e) => {
                warn!(table = %self.table, error = %e, "Failed to resolve current user");
                return self.snapshot();
            }
        };

        self.state.send_modify(|s| {
            s.is_loading = true;
            s.error = None;
        });

        let (records, error) = if self.network.is_online() {
            match self.load_remote(&user).await {
                Ok(records) => (records, None),
                Err(e) => {
                    let message = format!("{e:#}");
                    warn!(table = %self.table, error = %message, "Remote load failed, using local data");
                    (self.load_local_or_current(&user).await, Some(message))
                }
            }
        } else {
            (self.load_local_or_current(&user).await, None)
        };

        debug!(table = %self.table, count = records.len(), "Collection refreshed");
        self.state.send_modify(|s| {
            s.records = records;
            s.is_loading = false;
            s.error = error;
        });
        self.snapshot()
    }

    async fn load_remote(&self, user: &UserId) -> anyhow::Result<Vec<Record>> {
        let filter = RowFilter::new()
            .eq("user_id", user.as_str())
            .order_desc("created_at");
        let rows = self
            .remote
            .select(self.table, &filter)
            .await
            .with_context(|| format!("select {}", self.table))?;

        for row in &rows {
            let mut mirror = row.clone();
            mirror.set_synced(true);
            self.local_store
                .put(self.table, mirror)
                .await
                .with_context(|| format!("mirror {} row locally", self.table))?;
        }
        Ok(rows)
    }

    async fn load_local(&self, user: &UserId) -> anyhow::Result<Vec<Record>> {
        self.local_store
            .get_by_index(self.table, &IndexQuery::user_id(user.as_str()))
            .await
    }

    /// Local rows, or the current view if even the Local Store fails
    async fn load_local_or_current(&self, user: &UserId) -> Vec<Record> {
        match self.load_local(user).await {
            Ok(records) => records,
            Err(e) => {
                warn!(table = %self.table, error = %format!("{e:#}"), "Local load failed");
                self.records()
            }
        }
    }

    // ========================================================================
    // upsert
    // ========================================================================

    /// Writes a record for the current user
    ///
    /// Stamps `user_id` and `updated_at`, plus `id` and `created_at` when the
    /// record is new. Online, the remote copy is written first and its
    /// confirmed version is mirrored locally; offline, the record is stored
    /// locally as unsynced. The stored version replaces the entry with the
    /// same id in the view, or is prepended.
    ///
    /// Returns `Ok(None)` when nobody is signed in.
    ///
    /// # Errors
    /// Remote and Local Store failures are returned as-is; a failed remote
    /// write leaves the Local Store and the view untouched.
    pub async fn upsert(&self, record: Record) -> anyhow::Result<Option<Record>> {
        let Some(user) = self.session.current_user().await? else {
            debug!(table = %self.table, "No authenticated user, upsert ignored");
            return Ok(None);
        };

        let now = now_timestamp();
        let mut record = record;
        if record.id().is_none() {
            record.set_id(&RecordId::generate());
            record.set("created_at", now.clone());
        }
        record.set("user_id", user.as_str());
        record.set("updated_at", now);
        record.remove(SYNCED_FIELD);

        let stored = if self.network.is_online() {
            let confirmed = self
                .remote
                .upsert(self.table, &record)
                .await
                .with_context(|| format!("upsert {}", self.table))?;

            let mut mirror = confirmed.clone();
            mirror.set_synced(true);
            self.local_store.put(self.table, mirror).await?;
            confirmed
        } else {
            self.local_store.put(self.table, record).await?
        };

        debug!(table = %self.table, record_id = ?stored.id(), "Record saved");
        self.splice(stored.clone());
        Ok(Some(stored))
    }

    /// Replaces the entry with the same id, or prepends
    fn splice(&self, record: Record) {
        let id = record.id();
        self.state.send_modify(|s| {
            match s.records.iter().position(|r| r.id().is_some() && r.id() == id) {
                Some(index) => s.records[index] = record,
                None => s.records.insert(0, record),
            }
        });
    }

    // ========================================================================
    // delete
    // ========================================================================

    /// Deletes a record
    ///
    /// Online, the remote delete runs first and any failure aborts before
    /// local state is touched. Offline, only the local copy is removed,
    /// unless queued deletes are enabled, in which case a tombstone is left
    /// for the next upload.
    pub async fn delete(&self, id: &RecordId) -> anyhow::Result<()> {
        if self.network.is_online() {
            self.remote
                .delete(self.table, id)
                .await
                .with_context(|| format!("delete {}/{}", self.table, id))?;
        } else if self.queue_offline_deletes {
            let snapshot = self.local_store.get_by_id(self.table, id).await?;
            self.local_store
                .enqueue(&SyncQueueItem::delete(self.table, id.clone(), snapshot))
                .await?;
            debug!(table = %self.table, record_id = %id, "Queued offline delete");
        } else {
            debug!(table = %self.table, record_id = %id, "Offline delete is local only");
        }

        self.local_store.remove(self.table, id).await?;
        self.state.send_modify(|s| {
            s.records.retain(|r| r.id().as_ref() != Some(id));
        });
        Ok(())
    }
}
