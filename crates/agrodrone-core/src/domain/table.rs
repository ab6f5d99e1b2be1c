//! Synchronized table catalogue
//!
//! Every table mirrored on the device is listed here. Owned tables carry a
//! `user_id` column and are fetched per user; junction tables only reference
//! a parent row through a foreign key and are fetched by parent-id membership.
//!
//! Processing order matters: parents are listed before the junction tables
//! that reference them, so uploads and downloads never push a child before
//! its parent exists.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A logical table synchronized between the device and the remote store
///
/// Ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableName {
    Properties,
    Products,
    Applications,
    ApplicationProducts,
    Recipes,
    RecipeProducts,
    Equipment,
    FlightPlanning,
}

/// Category of a table, which decides how it is fetched from the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Rows carry `user_id` and are fetched filtered by the current user
    Owned,
    /// Rows reference `parent` through `foreign_key`; no direct owner column
    Junction {
        parent: TableName,
        foreign_key: &'static str,
    },
}

/// Owned tables in declared order
pub const OWNED_TABLES: [TableName; 6] = [
    TableName::Properties,
    TableName::Products,
    TableName::Applications,
    TableName::Recipes,
    TableName::Equipment,
    TableName::FlightPlanning,
];

/// Junction tables, processed after every owned table
pub const JUNCTION_TABLES: [TableName; 2] =
    [TableName::ApplicationProducts, TableName::RecipeProducts];

/// Upload order: owned tables first, then junction tables
pub const ALL_TABLES: [TableName; 8] = [
    TableName::Properties,
    TableName::Products,
    TableName::Applications,
    TableName::Recipes,
    TableName::Equipment,
    TableName::FlightPlanning,
    TableName::ApplicationProducts,
    TableName::RecipeProducts,
];

impl TableName {
    /// Physical table name, shared by the local schema and the remote API
    pub const fn as_str(&self) -> &'static str {
        match self {
            TableName::Properties => "properties",
            TableName::Products => "products",
            TableName::Applications => "applications",
            TableName::ApplicationProducts => "application_products",
            TableName::Recipes => "recipes",
            TableName::RecipeProducts => "recipe_products",
            TableName::Equipment => "equipment",
            TableName::FlightPlanning => "flight_planning",
        }
    }

    pub const fn kind(&self) -> TableKind {
        match self {
            TableName::ApplicationProducts => TableKind::Junction {
                parent: TableName::Applications,
                foreign_key: "application_id",
            },
            TableName::RecipeProducts => TableKind::Junction {
                parent: TableName::Recipes,
                foreign_key: "recipe_id",
            },
            _ => TableKind::Owned,
        }
    }

    pub const fn is_owned(&self) -> bool {
        matches!(self.kind(), TableKind::Owned)
    }

    /// Sync metadata key holding this table's download watermark
    pub fn last_sync_key(&self) -> String {
        format!("{}_last_sync", self.as_str())
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_TABLES
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::UnknownTable(s.to_string()))
    }
}
