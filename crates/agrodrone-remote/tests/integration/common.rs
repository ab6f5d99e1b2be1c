//! Shared test helpers for gateway integration tests
//!
//! Each helper mounts the necessary mock endpoints and returns a configured
//! RestGateway pointing at the mock server.

use std::time::Duration;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use agrodrone_remote::{RestClient, RestGateway, RetryPolicy};

pub const API_KEY: &str = "test-anon-key";
pub const ACCESS_TOKEN: &str = "test-access-token";

/// Starts a mock server and returns a (MockServer, RestGateway) tuple.
///
/// The gateway retries twice with a 10ms base delay so retry tests stay fast.
pub async fn setup_gateway() -> (MockServer, RestGateway) {
    let server = MockServer::start().await;
    let gateway = gateway_for(&server, RetryPolicy::new(2, Duration::from_millis(10)));
    (server, gateway)
}

pub fn gateway_for(server: &MockServer, retry: RetryPolicy) -> RestGateway {
    gateway_at(&server.uri(), retry)
}

/// Gateway for an arbitrary base URL, configured like [`gateway_for`]
pub fn gateway_at(base_url: &str, retry: RetryPolicy) -> RestGateway {
    let client = RestClient::new(base_url)
        .expect("test base URL is valid")
        .with_api_key(API_KEY)
        .with_access_token(ACCESS_TOKEN)
        .with_timeout(Duration::from_secs(2))
        .with_retry_policy(retry);
    RestGateway::new(client).with_probe_timeout(Duration::from_millis(500))
}

/// Mounts `GET /rest/v1/{table}` returning `rows` for any query
pub async fn mount_select(server: &MockServer, table: &str, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{table}")))
        .and(header("apikey", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

/// Mounts `POST /rest/v1/{table}` echoing `row` back as the stored copy
pub async fn mount_upsert(server: &MockServer, table: &str, row: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(format!("/rest/v1/{table}")))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!([row])))
        .mount(server)
        .await;
}
