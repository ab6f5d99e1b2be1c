//! Integration tests for select, upsert, delete and probe

use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use agrodrone_core::domain::{Record, RecordId, TableName};
use agrodrone_core::ports::{IReachabilityProbe, IRemoteGateway, RowFilter};
use agrodrone_remote::{RemoteError, RetryPolicy};

use crate::common;

// ============================================================================
// select
// ============================================================================

#[tokio::test]
async fn test_select_sends_postgrest_filters() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/products"))
        .and(query_param("select", "*"))
        .and(query_param("user_id", "eq.u1"))
        .and(query_param("updated_at", "gte.2026-03-01T10:00:00.000Z"))
        .and(header("authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "p1", "user_id": "u1", "name": "Glifosato", "updated_at": "2026-03-01T12:00:00.000Z"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let filter = RowFilter::new()
        .eq("user_id", "u1")
        .gte("updated_at", "2026-03-01T10:00:00.000Z");
    let rows = gateway
        .select(TableName::Products, &filter)
        .await
        .expect("select failed");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_str("name"), Some("Glifosato"));
}

#[tokio::test]
async fn test_select_in_list_and_order() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/application_products"))
        .and(query_param("application_id", "in.(a1,a2)"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "ap1", "application_id": "a1"},
            {"id": "ap2", "application_id": "a2"}
        ])))
        .mount(&server)
        .await;

    let filter = RowFilter::new()
        .in_list("application_id", ["a1", "a2"])
        .order_desc("created_at");
    let rows = gateway
        .select(TableName::ApplicationProducts, &filter)
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_select_empty_in_list_skips_request() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let filter = RowFilter::new().in_list("recipe_id", Vec::<String>::new());
    let rows = gateway
        .select(TableName::RecipeProducts, &filter)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_select_rejects_non_object_rows() {
    let (server, gateway) = common::setup_gateway().await;
    common::mount_select(&server, "recipes", json!([1, 2, 3])).await;

    let err = gateway
        .select(TableName::Recipes, &RowFilter::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_select_unauthorized_is_not_retried() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/properties"))
        .respond_with(ResponseTemplate::new(401).set_body_string("JWT expired"))
        .expect(1)
        .mount(&server)
        .await;

    let err = gateway
        .select(TableName::Properties, &RowFilter::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::Unauthorized(msg)) if msg == "JWT expired"
    ));
}

// ============================================================================
// upsert
// ============================================================================

#[tokio::test]
async fn test_upsert_strips_synced_and_returns_server_row() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/products"))
        .and(query_param("on_conflict", "id"))
        .and(header_exists("prefer"))
        .and(body_json(json!([
            {"id": "p1", "user_id": "u1", "name": "Glifosato"}
        ])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            {"id": "p1", "user_id": "u1", "name": "Glifosato", "updated_at": "2026-03-01T12:00:00.000Z"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let record = Record::from_value(json!({
        "id": "p1", "user_id": "u1", "name": "Glifosato", "synced": false
    }))
    .unwrap();

    let stored = gateway.upsert(TableName::Products, &record).await.unwrap();
    assert_eq!(stored.updated_at(), Some("2026-03-01T12:00:00.000Z"));
    assert!(stored.synced().is_none());
}

#[tokio::test]
async fn test_upsert_constraint_violation_is_rejected() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/recipes"))
        .respond_with(
            ResponseTemplate::new(409).set_body_string("duplicate key value violates constraint"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let record = Record::new().with("id", "r1").with("user_id", "u1");
    let err = gateway
        .upsert(TableName::Recipes, &record)
        .await
        .unwrap_err();

    let remote = err.downcast_ref::<RemoteError>().expect("RemoteError");
    assert!(matches!(remote, RemoteError::Rejected { status: 409, .. }));
    assert!(!remote.is_transient());
}

#[tokio::test]
async fn test_upsert_empty_representation_is_invalid() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/equipment"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .mount(&server)
        .await;

    let record = Record::new().with("id", "e1");
    let err = gateway
        .upsert(TableName::Equipment, &record)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_upsert_returns_server_copy_with_defaults() {
    let (server, gateway) = common::setup_gateway().await;
    common::mount_upsert(
        &server,
        "flight_planning",
        json!({"id": "f1", "user_id": "u1", "area_ha": 12.5}),
    )
    .await;

    let record = Record::new().with("id", "f1").with("user_id", "u1");
    let stored = gateway
        .upsert(TableName::FlightPlanning, &record)
        .await
        .unwrap();
    assert_eq!(stored.get("area_ha"), Some(&json!(12.5)));
}

// ============================================================================
// delete
// ============================================================================

#[tokio::test]
async fn test_delete_filters_by_id() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/products"))
        .and(query_param("id", "eq.p1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    gateway
        .delete(TableName::Products, &RecordId::new("p1").unwrap())
        .await
        .expect("delete failed");
}

#[tokio::test]
async fn test_delete_not_found_is_success() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/products"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    gateway
        .delete(TableName::Products, &RecordId::new("ghost").unwrap())
        .await
        .expect("404 should be treated as success");
}

#[tokio::test]
async fn test_delete_forbidden_propagates() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/products"))
        .respond_with(ResponseTemplate::new(403).set_body_string("RLS"))
        .mount(&server)
        .await;

    let err = gateway
        .delete(TableName::Products, &RecordId::new("p1").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::Forbidden(_))
    ));
}

// ============================================================================
// probe
// ============================================================================

#[tokio::test]
async fn test_probe_reachable_on_client_error() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(gateway.probe().await);
}

#[tokio::test]
async fn test_probe_unreachable_on_server_error() {
    let (server, gateway) = common::setup_gateway().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(!gateway.probe().await);
}

#[tokio::test]
async fn test_probe_unreachable_when_connection_refused() {
    // Nothing listens on a port released right after binding
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let gateway = common::gateway_at(&format!("http://127.0.0.1:{port}"), RetryPolicy::none());

    assert!(!gateway.probe().await);
}
