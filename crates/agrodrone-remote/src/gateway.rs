//! RestGateway - IRemoteGateway implementation over PostgREST
//!
//! Translates [`RowFilter`] into PostgREST query parameters and maps rows
//! to and from [`Record`]s.
//!
//! ## Design Notes
//!
//! - Upserts post a one-element array with `on_conflict=id` and
//!   `Prefer: resolution=merge-duplicates,return=representation`; the
//!   first returned row is the server's confirmed copy.
//! - Deletes are filtered by `id=eq.<id>`; a 404 counts as success.
//! - The reachability probe bypasses the retry policy so a dead network is
//!   reported quickly.

use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, trace};

use agrodrone_core::domain::{Record, RecordId, TableName};
use agrodrone_core::ports::{Condition, IReachabilityProbe, IRemoteGateway, RowFilter};

use crate::client::RestClient;
use crate::RemoteError;

/// Timeout for a single reachability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const UPSERT_PREFER: &str = "resolution=merge-duplicates,return=representation";

/// Remote Gateway backed by a PostgREST endpoint
#[derive(Debug, Clone)]
pub struct RestGateway {
    client: RestClient,
    probe_timeout: Duration,
}

impl RestGateway {
    pub fn new(client: RestClient) -> Self {
        Self {
            client,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }
}

// ============================================================================
// PostgREST encoding helpers
// ============================================================================

/// Quotes an `in.(...)` member when it contains reserved characters
fn quote_list_value(value: &str) -> String {
    let reserved = value
        .chars()
        .any(|c| matches!(c, ',' | '(' | ')' | '"' | '\\') || c.is_whitespace());
    if reserved {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Converts a filter into PostgREST query pairs (always selects `*`)
pub fn postgrest_query(filter: &RowFilter) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), "*".to_string())];

    for condition in filter.conditions() {
        let value = match condition {
            Condition::Eq { value, .. } => format!("eq.{value}"),
            Condition::Gte { value, .. } => format!("gte.{value}"),
            Condition::In { values, .. } => {
                let members: Vec<String> = values.iter().map(|v| quote_list_value(v)).collect();
                format!("in.({})", members.join(","))
            }
        };
        pairs.push((condition.field().to_string(), value));
    }

    if let Some(field) = filter.order() {
        pairs.push(("order".to_string(), format!("{field}.desc")));
    }

    pairs
}

fn rows_to_records(rows: Vec<Value>) -> Result<Vec<Record>, RemoteError> {
    rows.into_iter()
        .map(|row| Record::from_value(row).map_err(|e| RemoteError::InvalidResponse(e.to_string())))
        .collect()
}

// ============================================================================
// IRemoteGateway implementation
// ============================================================================

#[async_trait::async_trait]
impl IRemoteGateway for RestGateway {
    async fn select(&self, table: TableName, filter: &RowFilter) -> anyhow::Result<Vec<Record>> {
        // An empty `in` list can never match; skip the round-trip
        let empty_in = filter
            .conditions()
            .iter()
            .any(|c| matches!(c, Condition::In { values, .. } if values.is_empty()));
        if empty_in {
            return Ok(Vec::new());
        }

        let query = postgrest_query(filter);
        let operation = format!("select {table}");
        let response = self
            .client
            .execute(&operation, || {
                self.client
                    .table_request(Method::GET, table.as_str())
                    .query(&query)
            })
            .await?;

        let rows: Vec<Value> = response.json().await.map_err(RemoteError::from)?;
        let records = rows_to_records(rows)?;
        debug!(%table, rows = records.len(), "Fetched remote rows");
        Ok(records)
    }

    async fn upsert(&self, table: TableName, record: &Record) -> anyhow::Result<Record> {
        let payload = vec![record.to_remote_payload()];
        let operation = format!("upsert {table}");
        let response = self
            .client
            .execute(&operation, || {
                self.client
                    .table_request(Method::POST, table.as_str())
                    .query(&[("on_conflict", "id")])
                    .header("Prefer", UPSERT_PREFER)
                    .json(&payload)
            })
            .await?;

        let rows: Vec<Value> = response.json().await.map_err(RemoteError::from)?;
        let stored = rows_to_records(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RemoteError::InvalidResponse(format!("upsert into {table} returned no rows"))
            })?;

        trace!(%table, record_id = ?stored.id(), "Upserted remote row");
        Ok(stored)
    }

    async fn delete(&self, table: TableName, id: &RecordId) -> anyhow::Result<()> {
        let operation = format!("delete {table}");
        let filter = format!("eq.{}", id.as_str());
        let result = self
            .client
            .execute(&operation, || {
                self.client
                    .table_request(Method::DELETE, table.as_str())
                    .query(&[("id", filter.as_str())])
            })
            .await;

        match result {
            Ok(_) => {
                trace!(%table, record_id = %id, "Deleted remote row");
                Ok(())
            }
            Err(RemoteError::NotFound(_)) => {
                debug!(%table, record_id = %id, "Remote row already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait::async_trait]
impl IReachabilityProbe for RestGateway {
    async fn probe(&self) -> bool {
        let url = format!("{}/rest/v1/", self.client.base_url());
        match self
            .client
            .request(Method::GET, &url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().as_u16() < 500,
            Err(e) => {
                trace!(error = %e, "Reachability probe failed");
                false
            }
        }
    }
}
