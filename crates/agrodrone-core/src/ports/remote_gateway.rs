//! Remote Gateway port (driven/secondary port)
//!
//! This module defines the interface to the hosted backend's row-level API,
//! plus the current-user session the gateway is authenticated as.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result`; adapters wrap their own error type so callers
//!   can downcast when they need to classify a failure.
//! - [`RowFilter`] is evaluated remotely by real adapters and locally by
//!   in-memory doubles through [`RowFilter::matches`], so both agree on
//!   semantics.

use std::cmp::Ordering;

use serde_json::Value;

use crate::domain::record::cmp_timestamps;
use crate::domain::{Record, RecordId, TableName, UserId};

// ============================================================================
// RowFilter
// ============================================================================

/// A single predicate on one column
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field = value`
    Eq { field: String, value: String },
    /// `field >= value`
    Gte { field: String, value: String },
    /// `field IN (values)`
    In { field: String, values: Vec<String> },
}

impl Condition {
    pub fn field(&self) -> &str {
        match self {
            Condition::Eq { field, .. } | Condition::Gte { field, .. } | Condition::In { field, .. } => {
                field
            }
        }
    }

    fn matches(&self, record: &Record) -> bool {
        let Some(actual) = record.get(self.field()).and_then(value_as_text) else {
            return false;
        };
        match self {
            Condition::Eq { value, .. } => actual == *value,
            Condition::Gte { value, .. } => cmp_timestamps(&actual, value) != Ordering::Less,
            Condition::In { values, .. } => values.iter().any(|v| *v == actual),
        }
    }
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Filter criteria for a remote select
///
/// All conditions are combined with AND logic. An empty filter selects
/// every row the session can see.
///
/// # Example
///
/// ```
/// use agrodrone_core::ports::RowFilter;
///
/// let filter = RowFilter::new()
///     .eq("user_id", "u1")
///     .gte("updated_at", "2026-03-01T10:00:00.000Z");
/// assert_eq!(filter.conditions().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowFilter {
    conditions: Vec<Condition>,
    order_desc: Option<String>,
}

impl RowFilter {
    /// Creates an empty filter (matches all rows)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Gte {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn in_list<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions.push(Condition::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Orders results by `field`, newest first
    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.order_desc = Some(field.into());
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn order(&self) -> Option<&str> {
        self.order_desc.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.order_desc.is_none()
    }

    /// Returns true if the record satisfies every condition
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }

    /// Sorts rows according to the requested order, if any
    pub fn sort(&self, rows: &mut [Record]) {
        if let Some(field) = &self.order_desc {
            rows.sort_by(|a, b| {
                let a = a.get(field).and_then(value_as_text).unwrap_or_default();
                let b = b.get(field).and_then(value_as_text).unwrap_or_default();
                cmp_timestamps(&b, &a)
            });
        }
    }
}

// ============================================================================
// IRemoteGateway trait
// ============================================================================

/// Port trait for the hosted backend
///
/// ## Implementation Notes
///
/// - `upsert` uses `id` as the conflict key and returns the row as the
///   server stored it.
/// - `delete` of a missing row succeeds.
/// - Adapters should bound every call with a timeout.
#[async_trait::async_trait]
pub trait IRemoteGateway: Send + Sync {
    async fn select(&self, table: TableName, filter: &RowFilter) -> anyhow::Result<Vec<Record>>;

    async fn upsert(&self, table: TableName, record: &Record) -> anyhow::Result<Record>;

    async fn delete(&self, table: TableName, id: &RecordId) -> anyhow::Result<()>;
}

/// Resolves the user the remote session is authenticated as
#[async_trait::async_trait]
pub trait IAuthSession: Send + Sync {
    /// `None` when nobody is signed in
    async fn current_user(&self) -> anyhow::Result<Option<UserId>>;
}
