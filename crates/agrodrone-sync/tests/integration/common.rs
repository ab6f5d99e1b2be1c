//! Shared test doubles and setup
//!
//! [`MockGateway`] is an in-memory remote store that evaluates
//! [`RowFilter`] the same way the PostgREST adapter's server would, records
//! every call, and can be told to fail or pause specific operations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Notify;

use agrodrone_cache::{DatabasePool, SqliteLocalStore};
use agrodrone_core::domain::{now_timestamp, Record, RecordId, TableName, UserId};
use agrodrone_core::ports::{
    IAuthSession, INetworkStatus, INotificationService, IRemoteGateway, Notification, RowFilter,
};
use agrodrone_sync::{OfflineCollection, SyncOrchestrator};

// ============================================================================
// MockGateway
// ============================================================================

/// One recorded gateway call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Select { table: TableName, filter: RowFilter },
    Upsert { table: TableName, record: Record },
    Delete { table: TableName, id: RecordId },
}

/// Blocks the next upsert until released
pub struct PausePoint {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct MockGateway {
    rows: Mutex<HashMap<TableName, Vec<Record>>>,
    calls: Mutex<Vec<Call>>,
    failing_upserts: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    failing_selects: Mutex<HashSet<TableName>>,
    pause: Mutex<Option<Arc<PausePoint>>>,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seeds a remote row as-is
    pub fn insert(&self, table: TableName, record: Record) {
        let mut rows = self.rows.lock().unwrap();
        let table_rows = rows.entry(table).or_default();
        table_rows.retain(|r| r.id() != record.id());
        table_rows.push(record);
    }

    pub fn rows(&self, table: TableName) -> Vec<Record> {
        self.rows
            .lock()
            .unwrap()
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row(&self, table: TableName, id: &str) -> Option<Record> {
        self.rows(table)
            .into_iter()
            .find(|r| r.get_str("id") == Some(id))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upserts(&self) -> Vec<(TableName, Record)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upsert { table, record } => Some((table, record)),
                _ => None,
            })
            .collect()
    }

    pub fn selects(&self, table: TableName) -> Vec<RowFilter> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Select { table: t, filter } if t == table => Some(filter),
                _ => None,
            })
            .collect()
    }

    pub fn fail_upsert(&self, id: &str) {
        self.failing_upserts.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_delete(&self, id: &str) {
        self.failing_deletes.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_select(&self, table: TableName) {
        self.failing_selects.lock().unwrap().insert(table);
    }

    pub fn clear_failures(&self) {
        self.failing_upserts.lock().unwrap().clear();
        self.failing_deletes.lock().unwrap().clear();
        self.failing_selects.lock().unwrap().clear();
    }

    /// Makes the next upsert wait until `release` is notified
    pub fn pause_next_upsert(&self) -> Arc<PausePoint> {
        let point = Arc::new(PausePoint {
            entered: Notify::new(),
            release: Notify::new(),
        });
        *self.pause.lock().unwrap() = Some(Arc::clone(&point));
        point
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl IRemoteGateway for MockGateway {
    async fn select(&self, table: TableName, filter: &RowFilter) -> anyhow::Result<Vec<Record>> {
        self.record(Call::Select {
            table,
            filter: filter.clone(),
        });
        if self.failing_selects.lock().unwrap().contains(&table) {
            anyhow::bail!("connection reset while reading {table}");
        }

        let mut rows: Vec<Record> = self
            .rows(table)
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        filter.sort(&mut rows);
        Ok(rows)
    }

    async fn upsert(&self, table: TableName, record: &Record) -> anyhow::Result<Record> {
        self.record(Call::Upsert {
            table,
            record: record.clone(),
        });

        let pause = self.pause.lock().unwrap().take();
        if let Some(point) = pause {
            point.entered.notify_one();
            point.release.notified().await;
        }

        let id = record.get_str("id").unwrap_or_default().to_string();
        if self.failing_upserts.lock().unwrap().contains(&id) {
            anyhow::bail!("duplicate key value violates unique constraint ({table}/{id})");
        }

        let mut stored = record.clone();
        if stored.updated_at().is_none() {
            stored.set("updated_at", now_timestamp());
        }
        self.insert(table, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, table: TableName, id: &RecordId) -> anyhow::Result<()> {
        self.record(Call::Delete {
            table,
            id: id.clone(),
        });
        if self.failing_deletes.lock().unwrap().contains(id.as_str()) {
            anyhow::bail!("request timed out deleting {table}/{id}");
        }

        if let Some(rows) = self.rows.lock().unwrap().get_mut(&table) {
            rows.retain(|r| r.get_str("id") != Some(id.as_str()));
        }
        Ok(())
    }
}

// ============================================================================
// Other doubles
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.notifications().into_iter().map(|n| n.title).collect()
    }
}

#[async_trait::async_trait]
impl INotificationService for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Connectivity flag flipped by the test
pub struct ToggleNetwork(AtomicBool);

impl ToggleNetwork {
    pub fn set(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl INetworkStatus for ToggleNetwork {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct StaticSession(pub Option<UserId>);

#[async_trait::async_trait]
impl IAuthSession for StaticSession {
    async fn current_user(&self) -> anyhow::Result<Option<UserId>> {
        Ok(self.0.clone())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub pool: DatabasePool,
    pub store: Arc<SqliteLocalStore>,
    pub remote: Arc<MockGateway>,
    pub network: Arc<ToggleNetwork>,
    pub notifier: Arc<RecordingNotifier>,
    pub session: Arc<StaticSession>,
}

impl Harness {
    /// Fresh in-memory store, empty remote, online, signed in as `u1`
    pub async fn new() -> Self {
        Self::with_user(Some("u1")).await
    }

    pub async fn with_user(user: Option<&str>) -> Self {
        let pool = DatabasePool::in_memory()
            .await
            .expect("Failed to create in-memory database");
        let store = Arc::new(SqliteLocalStore::new(pool.pool().clone()));
        Self {
            pool,
            store,
            remote: MockGateway::new(),
            network: Arc::new(ToggleNetwork(AtomicBool::new(true))),
            notifier: Arc::new(RecordingNotifier::default()),
            session: Arc::new(StaticSession(user.map(|u| UserId::new(u).unwrap()))),
        }
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            self.store.clone(),
            self.remote.clone(),
            self.network.clone(),
            self.notifier.clone(),
        )
    }

    pub fn collection(&self, table: TableName) -> OfflineCollection {
        OfflineCollection::new(
            table,
            self.store.clone(),
            self.remote.clone(),
            self.network.clone(),
            self.session.clone(),
        )
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn rid(id: &str) -> RecordId {
    RecordId::new(id).unwrap()
}

pub fn record(value: Value) -> Record {
    Record::from_value(value).unwrap()
}

/// Polls `condition` until it holds or two seconds pass
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
