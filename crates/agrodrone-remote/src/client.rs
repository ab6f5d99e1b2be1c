//! PostgREST HTTP client
//!
//! Provides a typed HTTP client for the hosted backend's REST interface.
//! Handles authentication headers, per-request timeouts, status
//! classification and retry of transient failures.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use agrodrone_remote::client::RestClient;
//! use reqwest::Method;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = RestClient::new("https://example.supabase.co")?
//!     .with_api_key("anon-key")
//!     .with_access_token("access-token");
//! let response = client
//!     .execute("list products", || client.table_request(Method::GET, "products"))
//!     .await?;
//! println!("status {}", response.status());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder, Response};
use tracing::debug;
use url::Url;

use agrodrone_core::config::RemoteConfig;

use crate::retry::{with_retry, RetryPolicy};
use crate::RemoteError;

/// Path prefix of the REST interface
const REST_PREFIX: &str = "rest/v1";

/// Default per-request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the hosted backend
///
/// Wraps `reqwest::Client` with the `apikey` and bearer headers, the base
/// URL and the retry policy.
#[derive(Debug, Clone)]
pub struct RestClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Anon/public key sent as `apikey`
    api_key: Option<String>,
    /// Session token sent as `Authorization: Bearer`
    access_token: Option<String>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RestClient {
    /// Creates a client for the given base URL
    ///
    /// # Errors
    /// Returns `RemoteError::InvalidConfig` if the URL does not parse or is
    /// not http(s).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, RemoteError> {
        let raw = base_url.as_ref().trim();
        let parsed = Url::parse(raw)
            .map_err(|e| RemoteError::InvalidConfig(format!("invalid base URL '{raw}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RemoteError::InvalidConfig(format!(
                "base URL must be http(s), got '{raw}'"
            )));
        }

        Ok(Self {
            client: Client::new(),
            base_url: raw.trim_end_matches('/').to_string(),
            api_key: None,
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        })
    }

    /// Creates a client from the `remote` configuration section
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let mut client = Self::new(&config.url)?
            .with_timeout(Duration::from_secs(config.request_timeout_secs))
            .with_retry_policy(RetryPolicy::from_config(config));
        client.api_key = config.api_key.clone();
        client.access_token = config.access_token.clone();
        debug!(
            base_url = %client.base_url,
            authenticated = client.access_token.is_some(),
            "Configured RestClient"
        );
        Ok(client)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// URL of a table endpoint, e.g. `{base}/rest/v1/products`
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, REST_PREFIX, table)
    }

    /// Creates an authenticated request builder for an absolute URL
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, url).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key);
        }
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Creates an authenticated request builder for a table endpoint
    pub fn table_request(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, &self.table_url(table))
    }

    /// Sends a request built by `build`, retrying transient failures
    ///
    /// `build` is called once per attempt. A non-2xx status is turned into
    /// the matching [`RemoteError`].
    pub async fn execute<B>(&self, operation: &str, build: B) -> Result<Response, RemoteError>
    where
        B: Fn() -> RequestBuilder + Sync,
    {
        let build = &build;
        with_retry(&self.retry, operation, move || async move {
            let response = build().send().await?;
            check_status(response).await
        })
        .await
    }
}

/// Maps a non-success response to a [`RemoteError`]
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    Err(RemoteError::from_status(status, body, retry_after))
}
