//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including invalid identifiers, unknown tables and malformed records.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Table name outside the synchronized catalogue
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Record payload is not a JSON object or lacks a required field
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
