//! OfflineCollection: refresh, upsert and delete on both network paths

use std::collections::HashSet;

use serde_json::json;

use agrodrone_core::domain::{QueueOperation, Record, TableName};
use agrodrone_core::ports::{ILocalStore, IndexQuery, RowFilter};

use crate::common::{record, rid, Harness};

fn ids(records: &[Record]) -> HashSet<String> {
    records
        .iter()
        .filter_map(|r| r.get_str("id").map(str::to_string))
        .collect()
}

// ============================================================================
// refresh
// ============================================================================

#[tokio::test]
async fn test_offline_refresh_reads_user_index() {
    let h = Harness::new().await;
    h.network.set(false);
    for (id, owner) in [("p1", "u1"), ("p2", "u1"), ("p3", "u2")] {
        h.store
            .put(
                TableName::Products,
                record(json!({"id": id, "user_id": owner})),
            )
            .await
            .unwrap();
    }

    let collection = h.collection(TableName::Products);
    let snapshot = collection.refresh().await;

    let expected = h
        .store
        .get_by_index(TableName::Products, &IndexQuery::user_id("u1"))
        .await
        .unwrap();
    assert_eq!(ids(&snapshot.records), ids(&expected));
    assert_eq!(snapshot.records.len(), 2);
    assert!(!snapshot.is_loading);
    assert!(snapshot.error.is_none());
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_online_refresh_mirrors_remote_rows() {
    let h = Harness::new().await;
    h.remote.insert(
        TableName::Properties,
        record(json!({"id": "f1", "user_id": "u1", "created_at": "2026-01-01T00:00:00.000Z"})),
    );
    h.remote.insert(
        TableName::Properties,
        record(json!({"id": "f2", "user_id": "u1", "created_at": "2026-02-01T00:00:00.000Z"})),
    );
    h.remote.insert(
        TableName::Properties,
        record(json!({"id": "f3", "user_id": "u2", "created_at": "2026-03-01T00:00:00.000Z"})),
    );

    let collection = h.collection(TableName::Properties);
    let snapshot = collection.refresh().await;

    let order: Vec<_> = snapshot
        .records
        .iter()
        .map(|r| r.get_str("id").unwrap())
        .collect();
    assert_eq!(order, vec!["f2", "f1"]);
    assert_eq!(
        h.remote.selects(TableName::Properties)[0],
        RowFilter::new().eq("user_id", "u1").order_desc("created_at")
    );

    let mirrored = h.store.get_all(TableName::Properties).await.unwrap();
    assert_eq!(mirrored.len(), 2);
    assert!(mirrored.iter().all(Record::is_synced));
}

#[tokio::test]
async fn test_remote_failure_falls_back_to_local() {
    let h = Harness::new().await;
    h.store
        .put(
            TableName::Equipment,
            record(json!({"id": "e1", "user_id": "u1", "model": "T40"})),
        )
        .await
        .unwrap();
    h.remote.fail_select(TableName::Equipment);

    let collection = h.collection(TableName::Equipment);
    let snapshot = collection.refresh().await;

    assert_eq!(ids(&snapshot.records), HashSet::from(["e1".to_string()]));
    assert!(snapshot.error.is_some());
    assert!(!snapshot.is_loading);

    // A later successful refresh clears the error
    h.remote.clear_failures();
    let snapshot = collection.refresh().await;
    assert!(snapshot.error.is_none());
}

#[tokio::test]
async fn test_refresh_without_user_does_nothing() {
    let h = Harness::with_user(None).await;
    let collection = h.collection(TableName::Products);

    let snapshot = collection.refresh().await;
    assert!(snapshot.records.is_empty());
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn test_subscribers_see_refresh() {
    let h = Harness::new().await;
    h.remote
        .insert(TableName::Recipes, record(json!({"id": "r1", "user_id": "u1"})));
    let collection = h.collection(TableName::Recipes);
    let mut rx = collection.subscribe();

    collection.refresh().await;

    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen.records.len(), 1);
    assert!(!seen.is_loading);
}

// ============================================================================
// upsert
// ============================================================================

#[tokio::test]
async fn test_upsert_without_user_returns_none() {
    let h = Harness::with_user(None).await;
    let collection = h.collection(TableName::Products);

    let stored = collection
        .upsert(record(json!({"name": "Glifosato"})))
        .await
        .unwrap();
    assert!(stored.is_none());
    assert!(h.remote.calls().is_empty());
    assert!(h.store.get_all(TableName::Products).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_online_upsert_writes_through() {
    let h = Harness::new().await;
    let collection = h.collection(TableName::Products);

    let stored = collection
        .upsert(record(json!({"name": "Glifosato", "synced": false})))
        .await
        .unwrap()
        .expect("signed in");

    let id = stored.get_str("id").expect("id assigned").to_string();
    assert_eq!(stored.get_str("user_id"), Some("u1"));
    assert!(stored.get_str("created_at").is_some());
    assert!(stored.updated_at().is_some());

    let (_, sent) = &h.remote.upserts()[0];
    assert!(!sent.contains("synced"));
    assert!(h.remote.row(TableName::Products, &id).is_some());

    let local = h
        .store
        .get_by_id(TableName::Products, &rid(&id))
        .await
        .unwrap()
        .unwrap();
    assert!(local.is_synced());

    assert_eq!(collection.records().len(), 1);
}

#[tokio::test]
async fn test_offline_upsert_is_local_and_unsynced() {
    let h = Harness::new().await;
    h.network.set(false);
    let collection = h.collection(TableName::Products);

    let created = collection
        .upsert(record(json!({"name": "Glifosato"})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(created.synced(), Some(false));
    assert!(h.remote.calls().is_empty());

    // Updating the same id replaces the entry instead of prepending
    let mut edited = created.clone();
    edited.set("name", "Glifosato 480");
    let created_at = created.get_str("created_at").unwrap().to_string();
    let updated = collection.upsert(edited).await.unwrap().unwrap();

    let records = collection.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get_str("name"), Some("Glifosato 480"));
    assert_eq!(updated.get_str("created_at"), Some(created_at.as_str()));

    let unsynced = h
        .store
        .get_unsynced_records(TableName::Products)
        .await
        .unwrap();
    assert_eq!(unsynced.len(), 1);
}

#[tokio::test]
async fn test_remote_upsert_error_leaves_local_state() {
    let h = Harness::new().await;
    let collection = h.collection(TableName::Recipes);
    h.remote.fail_upsert("r1");

    let result = collection
        .upsert(record(json!({"id": "r1", "name": "Mix"})))
        .await;

    assert!(result.is_err());
    assert!(h.store.get_all(TableName::Recipes).await.unwrap().is_empty());
    assert!(collection.records().is_empty());
}

// ============================================================================
// delete
// ============================================================================

#[tokio::test]
async fn test_online_delete_removes_remote_then_local() {
    let h = Harness::new().await;
    let collection = h.collection(TableName::Products);
    collection
        .upsert(record(json!({"id": "p1", "name": "Glifosato"})))
        .await
        .unwrap();

    collection.delete(&rid("p1")).await.unwrap();

    assert!(h.remote.row(TableName::Products, "p1").is_none());
    assert!(h
        .store
        .get_by_id(TableName::Products, &rid("p1"))
        .await
        .unwrap()
        .is_none());
    assert!(collection.records().is_empty());
}

#[tokio::test]
async fn test_remote_delete_error_aborts() {
    let h = Harness::new().await;
    let collection = h.collection(TableName::Products);
    collection
        .upsert(record(json!({"id": "p1", "name": "Glifosato"})))
        .await
        .unwrap();
    h.remote.fail_delete("p1");

    assert!(collection.delete(&rid("p1")).await.is_err());
    assert!(h
        .store
        .get_by_id(TableName::Products, &rid("p1"))
        .await
        .unwrap()
        .is_some());
    assert_eq!(collection.records().len(), 1);
}

#[tokio::test]
async fn test_offline_delete_is_local_only_by_default() {
    let h = Harness::new().await;
    let collection = h.collection(TableName::Products);
    collection
        .upsert(record(json!({"id": "p1", "name": "Glifosato"})))
        .await
        .unwrap();

    h.network.set(false);
    collection.delete(&rid("p1")).await.unwrap();

    assert!(h
        .store
        .get_by_id(TableName::Products, &rid("p1"))
        .await
        .unwrap()
        .is_none());
    assert!(h.remote.row(TableName::Products, "p1").is_some());
    assert!(h.store.queued_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_offline_delete_can_be_queued() {
    let h = Harness::new().await;
    let collection = h.collection(TableName::Products).with_queued_deletes(true);
    collection
        .upsert(record(json!({"id": "p1", "name": "Glifosato"})))
        .await
        .unwrap();

    h.network.set(false);
    collection.delete(&rid("p1")).await.unwrap();

    let queued = h.store.queued_items().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].operation, QueueOperation::Delete);
    assert_eq!(queued[0].record_id, rid("p1"));
    assert!(queued[0].data.is_some());

    // The next upload propagates it
    h.network.set(true);
    let tally = h
        .orchestrator()
        .sync_to_server()
        .await
        .unwrap();
    assert_eq!(tally.success, 1);
    assert!(h.remote.row(TableName::Products, "p1").is_none());
}
