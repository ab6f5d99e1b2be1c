//! AgroDrone Remote - PostgREST gateway for the hosted backend
//!
//! Provides an async client for:
//! - Filtered row selects (`eq`, `gte`, `in`, ordering)
//! - Upserts keyed by `id` and deletes by id
//! - Reachability probing for the connectivity monitor
//! - The configured user session
//!
//! Every request carries an explicit timeout, and transient failures are
//! retried with exponential backoff.
//!
//! ## Modules
//!
//! - [`client`] - HTTP client with auth headers, timeout and status classification
//! - [`gateway`] - `IRemoteGateway` and `IReachabilityProbe` implementation
//! - [`retry`] - Retry policy and backoff loop
//! - [`session`] - `IAuthSession` backed by configuration

pub mod client;
pub mod gateway;
pub mod retry;
pub mod session;

pub use client::RestClient;
pub use gateway::RestGateway;
pub use retry::RetryPolicy;
pub use session::ConfiguredSession;

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the remote store
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote refused the write (validation or constraint violation)
    #[error("Rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Credentials are missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Row-level security or permissions denied the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The table or row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Server-provided wait, when the `Retry-After` header was present
        retry_after: Option<Duration>,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// The request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(String),

    /// The response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The client was configured with unusable settings
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RemoteError {
    /// Classifies a non-success HTTP status
    pub fn from_status(status: StatusCode, body: String, retry_after: Option<Duration>) -> Self {
        let code = status.as_u16();
        match code {
            400 | 409 | 422 => RemoteError::Rejected {
                status: code,
                message: body,
            },
            401 => RemoteError::Unauthorized(body),
            403 => RemoteError::Forbidden(body),
            404 => RemoteError::NotFound(body),
            429 => RemoteError::TooManyRequests { retry_after },
            500..=599 => RemoteError::ServerError {
                status: code,
                message: body,
            },
            _ => RemoteError::InvalidResponse(format!("unexpected status {code}: {body}")),
        }
    }

    /// Returns true if retrying the same request may succeed
    ///
    /// Transient errors are network failures, timeouts, rate limiting and
    /// server errors. Rejections and auth failures are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Network(_)
                | RemoteError::Timeout
                | RemoteError::TooManyRequests { .. }
                | RemoteError::ServerError { .. }
        )
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else if e.is_decode() {
            RemoteError::InvalidResponse(e.to_string())
        } else {
            RemoteError::Network(e.to_string())
        }
    }
}
