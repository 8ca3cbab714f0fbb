//! Query-derived loads into the star schema.
//!
//! Fact and dimension loads share one primitive: build an `INSERT INTO`
//! around a source query, optionally truncating first. `TRUNCATE` commits
//! immediately on the target warehouse, so a failed insert after a truncate
//! leaves the table empty and surfaces as a failure rather than a silent
//! partial state.

use super::{DimensionSpec, FactSpec};
use crate::errors::{LoadError, WarehouseError};
use crate::warehouse::Warehouse;
use tracing::info;

/// Builds and runs `INSERT INTO table [(columns)] <query>`, optionally
/// truncating the table first.
///
/// A column list pins insert order against the query's projection (fact
/// loads); without one the query's column order is trusted to match the
/// table (dimension loads).
///
/// # Errors
///
/// [`LoadError::TruncateFailed`] aborts before the insert is attempted;
/// [`LoadError::InsertRejected`] retains the offending SQL;
/// [`LoadError::Connection`] when the warehouse could not be reached.
pub async fn load_via_query(
    warehouse: &dyn Warehouse,
    table: &str,
    columns: Option<&[String]>,
    query: &str,
    truncate_first: bool,
) -> Result<(), LoadError> {
    if truncate_first {
        let truncate_sql = format!("TRUNCATE TABLE {table}");
        warehouse
            .execute(&truncate_sql)
            .await
            .map_err(|e| LoadError::TruncateFailed {
                table: table.to_owned(),
                reason: e.to_string(),
            })?;
    }

    let insert_sql = insert_statement(table, columns, query);
    warehouse.execute(&insert_sql).await.map_err(|e| match e {
        WarehouseError::Connection { reason } => LoadError::Connection { reason },
        WarehouseError::Statement { sql, reason } => LoadError::InsertRejected { sql, reason },
    })?;

    Ok(())
}

fn insert_statement(table: &str, columns: Option<&[String]>, query: &str) -> String {
    match columns {
        Some(columns) if !columns.is_empty() => {
            format!("INSERT INTO {table} ({})\n{query}", columns.join(", "))
        }
        _ => format!("INSERT INTO {table}\n{query}"),
    }
}

/// Appends derived rows into the append-only fact table.
///
/// Never truncates, by construction: there is no code path from a fact load
/// to a `TRUNCATE` statement.
pub struct FactLoader<'a> {
    warehouse: &'a dyn Warehouse,
}

impl<'a> FactLoader<'a> {
    /// Creates a fact loader.
    #[must_use]
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }

    /// Runs the fact load.
    ///
    /// # Errors
    ///
    /// See [`load_via_query`].
    pub async fn load(&self, spec: &FactSpec) -> Result<(), LoadError> {
        info!(table = %spec.table, "loading fact table");
        load_via_query(
            self.warehouse,
            &spec.table,
            Some(&spec.columns),
            &spec.query,
            false,
        )
        .await?;
        info!(table = %spec.table, "fact load complete");
        Ok(())
    }
}

/// Rebuilds (or appends to) a dimension table from a source query.
pub struct DimensionLoader<'a> {
    warehouse: &'a dyn Warehouse,
}

impl<'a> DimensionLoader<'a> {
    /// Creates a dimension loader.
    #[must_use]
    pub fn new(warehouse: &'a dyn Warehouse) -> Self {
        Self { warehouse }
    }

    /// Runs the dimension load.
    ///
    /// # Errors
    ///
    /// See [`load_via_query`].
    pub async fn load(&self, spec: &DimensionSpec) -> Result<(), LoadError> {
        info!(table = %spec.table, truncate = spec.truncate, "loading dimension table");
        load_via_query(self.warehouse, &spec.table, None, &spec.query, spec.truncate).await?;
        info!(table = %spec.table, "dimension load complete");
        Ok(())
    }
}
