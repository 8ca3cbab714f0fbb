//! Error taxonomy for starlift pipelines.
//!
//! Every task failure is classified into an [`ErrorKind`] which drives the
//! retry decision: configuration and assertion errors are never retried,
//! connection and execution errors are retried per policy, and upstream
//! failures are pure propagation signals.

use crate::warehouse::Scalar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a task failure, used to decide retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed spec detected before or during execution. Never retried.
    Config,
    /// Credential or warehouse connectivity failure. Retried per policy.
    Connection,
    /// Statement rejected by the warehouse, or an attempt timed out. Retried per policy.
    Execution,
    /// A data quality check did not hold. Never retried.
    Assertion,
    /// Cascaded failure from an upstream task. Never retried.
    Upstream,
}

impl ErrorKind {
    /// Returns true if failures of this kind are eligible for retry.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Connection | Self::Execution)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config => write!(f, "config"),
            Self::Connection => write!(f, "connection"),
            Self::Execution => write!(f, "execution"),
            Self::Assertion => write!(f, "assertion"),
            Self::Upstream => write!(f, "upstream"),
        }
    }
}

/// Errors detected while building or validating a pipeline graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A table or column name failed the identifier guard.
    #[error("invalid SQL identifier: '{identifier}'")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
    },

    /// Two tasks share a name.
    #[error("duplicate task name: '{name}'")]
    DuplicateTask {
        /// The conflicting name.
        name: String,
    },

    /// A dependency references a task that does not exist.
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency {
        /// The task declaring the dependency.
        task: String,
        /// The missing dependency name.
        dependency: String,
    },

    /// A task depends on itself.
    #[error("task '{task}' cannot depend on itself")]
    SelfDependency {
        /// The offending task.
        task: String,
    },

    /// The dependency edges form a cycle.
    #[error("cycle detected in pipeline: {}", path.join(" -> "))]
    CycleDetected {
        /// The tasks forming the cycle, first repeated at the end.
        path: Vec<String>,
    },

    /// The builder was asked to finalize a graph with no tasks.
    #[error("pipeline has no tasks")]
    EmptyGraph,

    /// A run-scoped variable needed at graph-build time was missing.
    #[error("missing pipeline variable: '{name}'")]
    MissingVariable {
        /// The variable name.
        name: String,
    },
}

/// Errors from the warehouse interface.
#[derive(Debug, Clone, Error)]
pub enum WarehouseError {
    /// The warehouse could not be reached or a session could not be acquired.
    #[error("warehouse connection failed: {reason}")]
    Connection {
        /// Connectivity failure detail.
        reason: String,
    },

    /// A statement was rejected by the warehouse.
    #[error("statement rejected: {reason}")]
    Statement {
        /// The offending SQL, retained for diagnostics.
        sql: String,
        /// Rejection detail.
        reason: String,
    },
}

/// Errors from staging object-storage data into a landing table.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// The credential provider could not vend credentials.
    #[error("object storage credentials unavailable: {reason}")]
    CredentialsUnavailable {
        /// Provider failure detail.
        reason: String,
    },

    /// The object-storage source could not be reached.
    #[error("source unreachable: {path}: {reason}")]
    SourceUnreachable {
        /// The object-storage path.
        path: String,
        /// Connectivity detail.
        reason: String,
    },

    /// The bulk load was rejected (malformed records, schema mismatch).
    #[error("bulk load rejected: {reason}")]
    LoadRejected {
        /// The offending SQL, retained for diagnostics.
        sql: String,
        /// Rejection detail.
        reason: String,
    },

    /// The pre-load truncate failed; the load is aborted.
    #[error("truncate of '{table}' failed: {reason}")]
    TruncateFailed {
        /// The target table.
        table: String,
        /// Failure detail.
        reason: String,
    },
}

/// Errors from fact and dimension loads.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The pre-insert truncate failed; the insert is never attempted.
    #[error("truncate of '{table}' failed: {reason}")]
    TruncateFailed {
        /// The target table.
        table: String,
        /// Failure detail.
        reason: String,
    },

    /// The insert was rejected (schema mismatch, type coercion error).
    #[error("insert rejected: {reason}")]
    InsertRejected {
        /// The offending SQL, retained for diagnostics.
        sql: String,
        /// Rejection detail.
        reason: String,
    },

    /// The warehouse could not be reached.
    #[error("warehouse connection failed: {reason}")]
    Connection {
        /// Connectivity detail.
        reason: String,
    },
}

/// Errors from the quality gate.
#[derive(Debug, Clone, Error)]
pub enum QualityError {
    /// An empty check list is a configuration error, not a vacuous pass.
    #[error("no quality assertions provided")]
    NoAssertions,

    /// An assertion has an empty query.
    #[error("quality assertion #{index} is missing its query")]
    MissingQuery {
        /// 1-based assertion index.
        index: usize,
    },

    /// An assertion query returned no usable scalar.
    #[error("quality assertion #{index} returned no result: {query}")]
    EmptyResult {
        /// 1-based assertion index.
        index: usize,
        /// The query that produced no result.
        query: String,
    },

    /// An assertion names a comparison symbol outside the recognized set.
    #[error("quality assertion #{index} has invalid comparison '{symbol}'")]
    InvalidComparator {
        /// 1-based assertion index.
        index: usize,
        /// The unrecognized symbol.
        symbol: String,
    },

    /// The comparison did not hold; the gate stops here.
    #[error(
        "quality assertion #{index} failed: {query} | actual: {actual} {comparator} expected: {expected}"
    )]
    AssertionFailed {
        /// 1-based assertion index.
        index: usize,
        /// The check query.
        query: String,
        /// The scalar the warehouse returned.
        actual: Scalar,
        /// The comparison symbol applied.
        comparator: String,
        /// The expected value.
        expected: Scalar,
    },

    /// The warehouse could not evaluate the check query.
    #[error("quality assertion #{index} could not be evaluated: {reason}")]
    QueryFailed {
        /// 1-based assertion index.
        index: usize,
        /// Failure detail.
        reason: String,
    },
}

/// The error produced by a single task execution attempt.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A graph or spec configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A staging failure.
    #[error(transparent)]
    Stage(#[from] StageError),

    /// A fact or dimension load failure.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A quality gate failure.
    #[error(transparent)]
    Quality(#[from] QualityError),

    /// A raw warehouse failure (DDL and plain SQL tasks).
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    /// The attempt exceeded its configured ceiling.
    #[error("task attempt timed out after {timeout_ms}ms")]
    AttemptTimeout {
        /// The ceiling that was exceeded, in milliseconds.
        timeout_ms: u64,
    },

    /// The worker running the task died (panic or join failure).
    #[error("internal task failure: {reason}")]
    Internal {
        /// Failure detail.
        reason: String,
    },
}

impl TaskError {
    /// Classifies this error for retry and reporting purposes.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Stage(e) => match e {
                StageError::CredentialsUnavailable { .. }
                | StageError::SourceUnreachable { .. } => ErrorKind::Connection,
                StageError::LoadRejected { .. } | StageError::TruncateFailed { .. } => {
                    ErrorKind::Execution
                }
            },
            Self::Load(e) => match e {
                LoadError::Connection { .. } => ErrorKind::Connection,
                LoadError::TruncateFailed { .. } | LoadError::InsertRejected { .. } => {
                    ErrorKind::Execution
                }
            },
            Self::Quality(e) => match e {
                QualityError::NoAssertions
                | QualityError::MissingQuery { .. }
                | QualityError::InvalidComparator { .. } => ErrorKind::Config,
                QualityError::AssertionFailed { .. } => ErrorKind::Assertion,
                QualityError::EmptyResult { .. } | QualityError::QueryFailed { .. } => {
                    ErrorKind::Execution
                }
            },
            Self::Warehouse(e) => match e {
                WarehouseError::Connection { .. } => ErrorKind::Connection,
                WarehouseError::Statement { .. } => ErrorKind::Execution,
            },
            Self::AttemptTimeout { .. } | Self::Internal { .. } => ErrorKind::Execution,
        }
    }

    /// Returns true if another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Returns the offending SQL when the error retains it.
    #[must_use]
    pub fn offending_sql(&self) -> Option<&str> {
        match self {
            Self::Stage(StageError::LoadRejected { sql, .. })
            | Self::Load(LoadError::InsertRejected { sql, .. })
            | Self::Warehouse(WarehouseError::Statement { sql, .. }) => Some(sql),
            Self::Quality(QualityError::AssertionFailed { query, .. })
            | Self::Quality(QualityError::EmptyResult { query, .. }) => Some(query),
            _ => None,
        }
    }
}

/// Serializable failure record stored on a task run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskFailure {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Human-readable failure detail.
    pub detail: String,
    /// The offending SQL, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

impl TaskFailure {
    /// Records an upstream-failure propagation.
    #[must_use]
    pub fn upstream(failed_task: &str) -> Self {
        Self {
            kind: ErrorKind::Upstream,
            detail: format!("upstream task '{failed_task}' failed"),
            sql: None,
        }
    }
}

impl From<&TaskError> for TaskFailure {
    fn from(err: &TaskError) -> Self {
        Self {
            kind: err.kind(),
            detail: err.to_string(),
            sql: err.offending_sql().map(ToOwned::to_owned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_not_retryable() {
        let err = TaskError::Config(ConfigError::EmptyGraph);
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_connection_and_execution_errors_are_retryable() {
        let conn = TaskError::Stage(StageError::CredentialsUnavailable {
            reason: "sts down".into(),
        });
        assert_eq!(conn.kind(), ErrorKind::Connection);
        assert!(conn.is_retryable());

        let exec = TaskError::Load(LoadError::InsertRejected {
            sql: "INSERT INTO users SELECT 1".into(),
            reason: "type mismatch".into(),
        });
        assert_eq!(exec.kind(), ErrorKind::Execution);
        assert!(exec.is_retryable());
    }

    #[test]
    fn test_assertion_failures_are_never_retryable() {
        let err = TaskError::Quality(QualityError::AssertionFailed {
            index: 1,
            query: "SELECT COUNT(*) FROM songplays".into(),
            actual: Scalar::Int(0),
            comparator: ">".into(),
            expected: Scalar::Int(0),
        });
        assert_eq!(err.kind(), ErrorKind::Assertion);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_check_list_is_a_config_error() {
        let err = TaskError::Quality(QualityError::NoAssertions);
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_counts_as_execution() {
        let err = TaskError::AttemptTimeout { timeout_ms: 30_000 };
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_task_failure_retains_offending_sql() {
        let err = TaskError::Load(LoadError::InsertRejected {
            sql: "INSERT INTO songs SELECT 1".into(),
            reason: "boom".into(),
        });
        let failure = TaskFailure::from(&err);
        assert_eq!(failure.kind, ErrorKind::Execution);
        assert_eq!(failure.sql.as_deref(), Some("INSERT INTO songs SELECT 1"));
    }

    #[test]
    fn test_cycle_error_display() {
        let err = ConfigError::CycleDetected {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert!(err.to_string().contains("a -> b -> a"));
    }
}
