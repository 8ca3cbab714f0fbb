//! Recording mocks for the external collaborator traits.

use crate::errors::WarehouseError;
use crate::providers::{CredentialError, CredentialProvider, StorageCredentials};
use crate::warehouse::{Row, Warehouse};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

struct FailureScript {
    pattern: String,
    remaining: usize,
    connection: bool,
    reason: String,
}

/// A warehouse double that records every statement and can be scripted to
/// fail statements matching a substring a fixed number of times.
#[derive(Default)]
pub struct MockWarehouse {
    executed: Mutex<Vec<String>>,
    queried: Mutex<Vec<String>>,
    statement_log: Mutex<Vec<String>>,
    query_results: Mutex<HashMap<String, Vec<Row>>>,
    default_query_result: Mutex<Option<Vec<Row>>>,
    rows_affected: Mutex<u64>,
    failures: Mutex<Vec<FailureScript>>,
    latency: Mutex<Option<Duration>>,
}

impl MockWarehouse {
    /// Creates an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the result rows for one exact query text.
    pub fn set_query_result(&self, sql: &str, rows: Vec<Row>) {
        self.query_results.lock().insert(sql.to_owned(), rows);
    }

    /// Scripts the result rows returned for any query without an exact
    /// match. Without this, unmatched queries return no rows.
    pub fn set_default_query_result(&self, rows: Vec<Row>) {
        *self.default_query_result.lock() = Some(rows);
    }

    /// Sets the rows-affected count reported by `execute`.
    pub fn set_rows_affected(&self, rows: u64) {
        *self.rows_affected.lock() = rows;
    }

    /// Scripts statement rejection for the next `times` statements or
    /// queries containing `pattern`.
    pub fn fail_matching(&self, pattern: &str, times: usize) {
        self.fail_matching_with(pattern, times, false, "scripted failure");
    }

    /// Scripts connection failure for the next `times` statements or
    /// queries containing `pattern`.
    pub fn fail_connection_matching(&self, pattern: &str, times: usize) {
        self.fail_matching_with(pattern, times, true, "scripted connection failure");
    }

    /// Scripts a failure with full control over kind and message.
    pub fn fail_matching_with(
        &self,
        pattern: &str,
        times: usize,
        connection: bool,
        reason: &str,
    ) {
        self.failures.lock().push(FailureScript {
            pattern: pattern.to_owned(),
            remaining: times,
            connection,
            reason: reason.to_owned(),
        });
    }

    /// Adds an artificial delay to every statement and query. Useful for
    /// exercising attempt timeouts.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Every statement passed to `execute`, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    /// Every statement and query in arrival order, interleaved. This is the
    /// log ordering assertions are written against.
    #[must_use]
    pub fn statement_log(&self) -> Vec<String> {
        self.statement_log.lock().clone()
    }

    /// Every query passed to `query`, in order.
    #[must_use]
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().clone()
    }

    /// Number of `execute` calls seen.
    #[must_use]
    pub fn execute_count(&self) -> usize {
        self.executed.lock().len()
    }

    /// Number of `query` calls seen.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queried.lock().len()
    }

    /// True if any executed statement contains the given fragment.
    #[must_use]
    pub fn executed_contains(&self, fragment: &str) -> bool {
        self.executed.lock().iter().any(|sql| sql.contains(fragment))
    }

    fn scripted_failure(&self, sql: &str) -> Option<WarehouseError> {
        let mut failures = self.failures.lock();
        for script in failures.iter_mut() {
            if script.remaining > 0 && sql.contains(&script.pattern) {
                script.remaining -= 1;
                return Some(if script.connection {
                    WarehouseError::Connection {
                        reason: script.reason.clone(),
                    }
                } else {
                    WarehouseError::Statement {
                        sql: sql.to_owned(),
                        reason: script.reason.clone(),
                    }
                });
            }
        }
        None
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn execute(&self, sql: &str) -> Result<u64, WarehouseError> {
        self.executed.lock().push(sql.to_owned());
        self.statement_log.lock().push(sql.to_owned());
        self.simulate_latency().await;
        if let Some(err) = self.scripted_failure(sql) {
            return Err(err);
        }
        Ok(*self.rows_affected.lock())
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>, WarehouseError> {
        self.queried.lock().push(sql.to_owned());
        self.statement_log.lock().push(sql.to_owned());
        self.simulate_latency().await;
        if let Some(err) = self.scripted_failure(sql) {
            return Err(err);
        }
        if let Some(rows) = self.query_results.lock().get(sql) {
            return Ok(rows.clone());
        }
        Ok(self
            .default_query_result
            .lock()
            .clone()
            .unwrap_or_default())
    }
}

/// A credential provider that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingCredentials;

#[async_trait]
impl CredentialProvider for FailingCredentials {
    async fn credentials(&self) -> Result<StorageCredentials, CredentialError> {
        Err(CredentialError::new("credential vending unavailable"))
    }
}
