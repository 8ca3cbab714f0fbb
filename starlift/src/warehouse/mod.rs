//! Narrow warehouse interface consumed by every task kind.
//!
//! Connection pooling and session management live outside this crate; tasks
//! see only [`Warehouse`]. Each call executes one statement atomically, and
//! `TRUNCATE` commits immediately on the target warehouse, which is what
//! gives truncate-then-insert its observable "empty on failed insert"
//! semantics.

use crate::errors::WarehouseError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::{PoolConfig, PostgresWarehouse};

/// A single scalar value read back from the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// SQL NULL.
    Null,
    /// Boolean column value.
    Bool(bool),
    /// Integer column value.
    Int(i64),
    /// Floating-point column value.
    Float(f64),
    /// Text column value.
    Text(String),
}

impl Scalar {
    /// Returns true for SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Compares two scalars by the natural ordering of the actual value's
    /// type. Integers and floats compare numerically across variants; values
    /// of unrelated types are incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Float(b)) => (*a as f64).partial_cmp(b),
            (Self::Float(a), Self::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// A row of scalar columns.
pub type Row = Vec<Scalar>;

/// Warehouse access as consumed by task executors.
///
/// Implementations resolve their connection parameters externally (a
/// connection identifier, a pool); tasks never see more than this surface.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Executes a statement and returns the number of rows affected.
    async fn execute(&self, sql: &str) -> Result<u64, WarehouseError>;

    /// Runs a query and returns its rows of scalar columns, in order.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, WarehouseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_numeric_cross_compare() {
        assert_eq!(
            Scalar::Int(5).compare(&Scalar::Float(5.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Scalar::Float(1.5).compare(&Scalar::Int(2)),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_scalar_unrelated_types_incomparable() {
        assert_eq!(Scalar::Text("5".into()).compare(&Scalar::Int(5)), None);
        assert_eq!(Scalar::Bool(true).compare(&Scalar::Int(1)), None);
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Null.to_string(), "NULL");
        assert_eq!(Scalar::Int(42).to_string(), "42");
        assert_eq!(Scalar::Text("free".into()).to_string(), "free");
    }

    #[test]
    fn test_scalar_serde_untagged() {
        let json = serde_json::to_string(&Scalar::Int(3)).unwrap();
        assert_eq!(json, "3");

        let back: Scalar = serde_json::from_str("null").unwrap();
        assert!(back.is_null());
    }
}
