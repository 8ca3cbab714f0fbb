//! PostgreSQL-protocol warehouse adapter (Redshift speaks it too).
//!
//! Enabled by the `postgres` cargo feature.

use super::{Row, Scalar, Warehouse};
use crate::errors::WarehouseError;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row as _};
use std::time::Duration;

/// Configuration for the warehouse connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of pooled connections.
    pub max_connections: u32,
    /// Minimum number of pooled connections.
    pub min_connections: u32,
    /// Ceiling on acquiring a connection from the pool.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Warehouse backend speaking the PostgreSQL wire protocol.
pub struct PostgresWarehouse {
    pool: PgPool,
}

impl PostgresWarehouse {
    /// Connects with the default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self, WarehouseError> {
        Self::connect_with(database_url, PoolConfig::default()).await
    }

    /// Connects with an explicit pool configuration.
    pub async fn connect_with(
        database_url: &str,
        config: PoolConfig,
    ) -> Result<Self, WarehouseError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| WarehouseError::Connection {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_error(sql: &str, err: &sqlx::Error) -> WarehouseError {
        match err {
            sqlx::Error::Database(db) => WarehouseError::Statement {
                sql: sql.to_owned(),
                reason: db.to_string(),
            },
            other => WarehouseError::Connection {
                reason: other.to_string(),
            },
        }
    }

    fn decode_column(row: &sqlx::postgres::PgRow, index: usize) -> Scalar {
        if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
            return v.map_or(Scalar::Null, Scalar::Int);
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
            return v.map_or(Scalar::Null, |n| Scalar::Int(i64::from(n)));
        }
        if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
            return v.map_or(Scalar::Null, Scalar::Float);
        }
        if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
            return v.map_or(Scalar::Null, Scalar::Bool);
        }
        if let Ok(v) = row.try_get::<Option<String>, _>(index) {
            return v.map_or(Scalar::Null, Scalar::Text);
        }
        Scalar::Null
    }
}

#[async_trait]
impl Warehouse for PostgresWarehouse {
    async fn execute(&self, sql: &str) -> Result<u64, WarehouseError> {
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::map_error(sql, &e))?;
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, WarehouseError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::map_error(sql, &e))?;

        Ok(rows
            .iter()
            .map(|row| {
                (0..row.columns().len())
                    .map(|i| Self::decode_column(row, i))
                    .collect()
            })
            .collect())
    }
}
