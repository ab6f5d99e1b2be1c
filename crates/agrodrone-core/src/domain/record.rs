//! Schemaless records and merge policies
//!
//! A [`Record`] is a JSON object with at least an `id`. Owned-table records
//! also carry `user_id`, and every persisted record carries `updated_at`.
//! The `synced` field is device-local: it is stored by the Local Store and
//! stripped before anything is sent to the remote.

use std::cmp::Ordering;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::DomainError;
use super::newtypes::RecordId;

/// Local-only flag, never sent to the remote store
pub const SYNCED_FIELD: &str = "synced";

/// Current time as an RFC 3339 UTC string with millisecond precision
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Formats a timestamp the same way [`now_timestamp`] does
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Orders two timestamp strings
///
/// Values that both parse as RFC 3339 are compared chronologically, so
/// `+00:00` and `Z` offsets or differing sub-second precision compare
/// correctly. Anything else falls back to lexical order.
pub fn cmp_timestamps(a: &str, b: &str) -> Ordering {
    match (
        DateTime::parse_from_rfc3339(a),
        DateTime::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

// ============================================================================
// Record
// ============================================================================

/// A single row of a synchronized table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from an arbitrary JSON value
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRecord` if the value is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DomainError::InvalidRecord(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Returns a field as a string slice when it holds a JSON string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    /// Builder-style variant of [`Record::set`]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// The record id, if present and non-empty
    pub fn id(&self) -> Option<RecordId> {
        self.get_str("id").and_then(|id| RecordId::new(id).ok())
    }

    pub fn set_id(&mut self, id: &RecordId) {
        self.set("id", id.as_str());
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get_str("user_id")
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.get_str("updated_at")
    }

    /// The local sync flag, `None` when the record never touched the Local Store
    pub fn synced(&self) -> Option<bool> {
        self.0.get(SYNCED_FIELD).and_then(Value::as_bool)
    }

    pub fn is_synced(&self) -> bool {
        self.synced() == Some(true)
    }

    pub fn set_synced(&mut self, synced: bool) {
        self.0.insert(SYNCED_FIELD.to_string(), Value::Bool(synced));
    }

    /// Copy of this record suitable for the remote store (no `synced` field)
    pub fn to_remote_payload(&self) -> Record {
        let mut payload = self.clone();
        payload.remove(SYNCED_FIELD);
        payload
    }
}

impl TryFrom<Value> for Record {
    type Error = DomainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

// ============================================================================
// MergePolicy
// ============================================================================

/// How a write into the Local Store treats the record's sync flag
///
/// Downloads are server-authoritative: whatever the remote returned replaces
/// the local copy and is considered confirmed. Local writes are
/// local-authoritative: the record stays pending until an upload confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Remote data wins; the stored record is always `synced = true`
    ServerAuthoritative,
    /// Local data wins; keeps an explicit `synced` value, defaults to `false`
    LocalAuthoritative,
}

impl MergePolicy {
    /// Sets the record's sync flag according to this policy
    pub fn apply(&self, record: &mut Record) {
        match self {
            MergePolicy::ServerAuthoritative => record.set_synced(true),
            MergePolicy::LocalAuthoritative => {
                if record.synced().is_none() {
                    record.set_synced(false);
                }
            }
        }
    }
}

impl std::fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MergePolicy::ServerAuthoritative => "server_authoritative",
            MergePolicy::LocalAuthoritative => "local_authoritative",
        };
        write!(f, "{}", s)
    }
}
