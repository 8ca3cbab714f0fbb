//! Staging loads: object storage into landing tables.

use super::StageSpec;
use crate::errors::{StageError, WarehouseError};
use crate::providers::{CredentialProvider, StorageCredentials};
use crate::warehouse::Warehouse;
use tracing::info;

/// Copies raw records from object storage into a landing table.
pub struct StageLoader<'a> {
    warehouse: &'a dyn Warehouse,
    credentials: &'a dyn CredentialProvider,
}

impl<'a> StageLoader<'a> {
    /// Creates a loader over a warehouse and a credential provider.
    #[must_use]
    pub fn new(warehouse: &'a dyn Warehouse, credentials: &'a dyn CredentialProvider) -> Self {
        Self {
            warehouse,
            credentials,
        }
    }

    /// Stages the spec's source into its landing table, returning the row
    /// count the warehouse reported.
    ///
    /// Credentials are fetched fresh for each invocation. When the spec asks
    /// for truncation, a truncate failure aborts the whole operation; no
    /// partial load is attempted into a table whose truncate failed.
    ///
    /// # Errors
    ///
    /// [`StageError::CredentialsUnavailable`], [`StageError::TruncateFailed`],
    /// [`StageError::SourceUnreachable`], or [`StageError::LoadRejected`] —
    /// all fatal to this task, none fatal to siblings that don't depend on it.
    pub async fn stage(&self, spec: &StageSpec) -> Result<u64, StageError> {
        let path = spec.s3_path();
        info!(table = %spec.table, path = %path, "staging from object storage");

        let credentials = self.credentials.credentials().await.map_err(|e| {
            StageError::CredentialsUnavailable {
                reason: e.to_string(),
            }
        })?;

        if spec.truncate {
            let truncate_sql = format!("TRUNCATE TABLE {}", spec.table);
            self.warehouse
                .execute(&truncate_sql)
                .await
                .map_err(|e| StageError::TruncateFailed {
                    table: spec.table.clone(),
                    reason: e.to_string(),
                })?;
        }

        let copy_sql = copy_statement(spec, &credentials);
        let rows = self
            .warehouse
            .execute(&copy_sql)
            .await
            .map_err(|e| match e {
                WarehouseError::Connection { reason } => StageError::SourceUnreachable {
                    path: path.clone(),
                    reason,
                },
                WarehouseError::Statement { reason, .. } => StageError::LoadRejected {
                    // Retain the redacted form; the real statement carries
                    // live credentials.
                    sql: copy_statement_redacted(spec),
                    reason,
                },
            })?;

        info!(table = %spec.table, rows, "staging load complete");
        Ok(rows)
    }
}

fn copy_statement_with_keys(spec: &StageSpec, access_key: &str, secret_key: &str) -> String {
    let timeformat = spec
        .timeformat
        .as_deref()
        .map(|fmt| format!(" TIMEFORMAT AS '{fmt}'"))
        .unwrap_or_default();

    format!(
        "COPY {table} FROM '{path}' ACCESS_KEY_ID '{access_key}' \
         SECRET_ACCESS_KEY '{secret_key}' REGION '{region}' \
         FORMAT AS JSON '{json}'{timeformat} \
         TRUNCATECOLUMNS BLANKSASNULL EMPTYASNULL;",
        table = spec.table,
        path = spec.s3_path(),
        region = spec.region,
        json = spec.json_format,
    )
}

/// The bulk-load statement for a spec with live credentials.
fn copy_statement(spec: &StageSpec, credentials: &StorageCredentials) -> String {
    copy_statement_with_keys(spec, &credentials.access_key, &credentials.secret_key)
}

/// The same statement with credentials masked, for diagnostics.
fn copy_statement_redacted(spec: &StageSpec) -> String {
    copy_statement_with_keys(spec, "<redacted>", "<redacted>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::StaticCredentials;
    use crate::testing::{FailingCredentials, MockWarehouse};
    use pretty_assertions::assert_eq;

    fn events_spec() -> StageSpec {
        StageSpec::new("staging_events", "udacity-dend", "data-pipelines/log-data")
            .with_json_path("s3://udacity-dend/data-pipelines/log_json_path.json")
            .with_timeformat("epochmillisecs")
    }

    #[tokio::test]
    async fn test_copy_statement_shape() {
        let warehouse = MockWarehouse::new();
        let provider = StaticCredentials::new("AKIA123", "sekrit");
        let loader = StageLoader::new(&warehouse, &provider);

        loader.stage(&events_spec()).await.unwrap();

        let executed = warehouse.executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[0], "TRUNCATE TABLE staging_events");
        assert_eq!(
            executed[1],
            "COPY staging_events FROM 's3://udacity-dend/data-pipelines/log-data' \
             ACCESS_KEY_ID 'AKIA123' SECRET_ACCESS_KEY 'sekrit' REGION 'us-east-1' \
             FORMAT AS JSON 's3://udacity-dend/data-pipelines/log_json_path.json' \
             TIMEFORMAT AS 'epochmillisecs' TRUNCATECOLUMNS BLANKSASNULL EMPTYASNULL;"
        );
    }

    #[tokio::test]
    async fn test_auto_json_without_timeformat() {
        let warehouse = MockWarehouse::new();
        let provider = StaticCredentials::new("k", "s");
        let loader = StageLoader::new(&warehouse, &provider);

        let spec = StageSpec::new("staging_songs", "udacity-dend", "data-pipelines/song-data");
        loader.stage(&spec).await.unwrap();

        let copy = &warehouse.executed()[1];
        assert!(copy.contains("FORMAT AS JSON 'auto'"));
        assert!(!copy.contains("TIMEFORMAT"));
    }

    #[tokio::test]
    async fn test_truncate_failure_aborts_before_copy() {
        let warehouse = MockWarehouse::new();
        warehouse.fail_matching("TRUNCATE", 1);
        let provider = StaticCredentials::new("k", "s");
        let loader = StageLoader::new(&warehouse, &provider);

        let err = loader.stage(&events_spec()).await.unwrap_err();
        assert!(matches!(err, StageError::TruncateFailed { .. }));
        // The COPY never ran.
        assert_eq!(warehouse.execute_count(), 1);
    }

    #[tokio::test]
    async fn test_append_mode_skips_truncate() {
        let warehouse = MockWarehouse::new();
        let provider = StaticCredentials::new("k", "s");
        let loader = StageLoader::new(&warehouse, &provider);

        let spec = events_spec().appending();
        loader.stage(&spec).await.unwrap();

        assert_eq!(warehouse.execute_count(), 1);
        assert!(!warehouse.executed_contains("TRUNCATE"));
    }

    #[tokio::test]
    async fn test_credential_failure_touches_nothing() {
        let warehouse = MockWarehouse::new();
        let provider = FailingCredentials;
        let loader = StageLoader::new(&warehouse, &provider);

        let err = loader.stage(&events_spec()).await.unwrap_err();
        assert!(matches!(err, StageError::CredentialsUnavailable { .. }));
        assert_eq!(warehouse.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_copy_redacts_credentials_in_diagnostics() {
        let warehouse = MockWarehouse::new();
        warehouse.fail_matching("COPY", 1);
        let provider = StaticCredentials::new("AKIA123", "sekrit");
        let loader = StageLoader::new(&warehouse, &provider);

        let err = loader.stage(&events_spec()).await.unwrap_err();
        match err {
            StageError::LoadRejected { sql, .. } => {
                assert!(sql.contains("<redacted>"));
                assert!(!sql.contains("sekrit"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_source_unreachable() {
        let warehouse = MockWarehouse::new();
        warehouse.fail_connection_matching("COPY", 1);
        let provider = StaticCredentials::new("k", "s");
        let loader = StageLoader::new(&warehouse, &provider);

        let err = loader.stage(&events_spec()).await.unwrap_err();
        assert!(matches!(err, StageError::SourceUnreachable { .. }));
    }

    #[tokio::test]
    async fn test_reports_row_count() {
        let warehouse = MockWarehouse::new();
        warehouse.set_rows_affected(8056);
        let provider = StaticCredentials::new("k", "s");
        let loader = StageLoader::new(&warehouse, &provider);

        let rows = loader.stage(&events_spec()).await.unwrap();
        assert_eq!(rows, 8056);
    }
}
