//! End-to-end runs of the songplay pipeline against the mock warehouse.

#[cfg(test)]
mod tests {
    use crate::config::{RetryPolicy, RunConfig};
    use crate::errors::ErrorKind;
    use crate::events::CollectingEventSink;
    use crate::graph::{RunContext, RunStatus, TaskState};
    use crate::pipelines::songplay_pipeline;
    use crate::providers::{InMemoryVariables, StaticCredentials};
    use crate::testing::{init_tracing, MockWarehouse};
    use crate::warehouse::Scalar;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn variables() -> InMemoryVariables {
        InMemoryVariables::new()
            .with("s3_bucket", "udacity-dend")
            .with("s3_prefix", "data-pipelines")
    }

    fn context(warehouse: Arc<MockWarehouse>) -> RunContext {
        RunContext::new(warehouse, Arc::new(StaticCredentials::new("AKIA", "secret"))).with_config(
            RunConfig::new().with_retry(RetryPolicy::new().with_delay(Duration::ZERO)),
        )
    }

    fn script_passing_quality_checks(warehouse: &MockWarehouse) {
        warehouse.set_query_result(
            "SELECT COUNT(*) FROM songplays",
            vec![vec![Scalar::Int(6820)]],
        );
        warehouse.set_query_result(
            "SELECT COUNT(*) FROM users WHERE userid IS NULL",
            vec![vec![Scalar::Int(0)]],
        );
        warehouse.set_query_result("SELECT COUNT(*) FROM songs", vec![vec![Scalar::Int(14896)]]);
        warehouse.set_query_result(
            "SELECT COUNT(*) FROM artists",
            vec![vec![Scalar::Int(10025)]],
        );
    }

    #[tokio::test]
    async fn test_full_run_succeeds() -> anyhow::Result<()> {
        init_tracing();
        let graph = songplay_pipeline(&variables())?;
        let warehouse = Arc::new(MockWarehouse::new());
        script_passing_quality_checks(&warehouse);

        let report = graph.execute(&context(warehouse.clone())).await;

        assert_eq!(report.status, RunStatus::Succeeded);
        assert!(report.first_failure.is_none());
        for (name, run) in &report.task_runs {
            assert_eq!(run.state, TaskState::Succeeded, "task {name}");
            assert_eq!(run.attempts, 1, "task {name}");
        }

        // 7 drops, 7 creates, 2 staging truncates, 2 copies, 1 fact insert,
        // 4 dimension truncates, 4 dimension inserts.
        assert_eq!(warehouse.execute_count(), 27);
        assert_eq!(warehouse.query_count(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_statements_respect_the_topology() -> anyhow::Result<()> {
        let graph = songplay_pipeline(&variables())?;
        let warehouse = Arc::new(MockWarehouse::new());
        script_passing_quality_checks(&warehouse);

        graph.execute(&context(warehouse.clone())).await;

        let log = warehouse.statement_log();
        let first = |needle: &str| {
            log.iter()
                .position(|sql| sql.contains(needle))
                .unwrap_or_else(|| panic!("no statement containing {needle}"))
        };
        let last = |needle: &str| {
            log.iter()
                .rposition(|sql| sql.contains(needle))
                .unwrap_or_else(|| panic!("no statement containing {needle}"))
        };

        // DDL strictly before staging, and every load strictly before the
        // quality checks. Loads in one branch may overlap the other
        // branch's staging, so no cross-branch assertion is made there.
        assert!(last("DROP TABLE") < first("CREATE TABLE"));
        assert!(last("CREATE TABLE") < first("COPY "));
        assert!(last("INSERT INTO") < first("SELECT COUNT(*)"));
        Ok(())
    }

    #[tokio::test]
    async fn test_quality_gate_waits_for_all_five_loads() -> anyhow::Result<()> {
        let graph = songplay_pipeline(&variables())?;
        let warehouse = Arc::new(MockWarehouse::new());
        script_passing_quality_checks(&warehouse);
        // Exhaust every attempt of the user dimension load.
        warehouse.fail_matching("INSERT INTO users", 3);

        let report = graph.execute(&context(warehouse.clone())).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.task_state("load_user_dim"), Some(TaskState::Failed));
        assert_eq!(
            report.task_state("quality_checks"),
            Some(TaskState::UpstreamFailed)
        );
        assert_eq!(report.task_state("stop"), Some(TaskState::UpstreamFailed));

        // The other loads finished on their own.
        assert_eq!(report.task_state("load_song_dim"), Some(TaskState::Succeeded));
        assert_eq!(report.task_state("load_artist_dim"), Some(TaskState::Succeeded));
        assert_eq!(
            report.task_state("load_songplays_fact"),
            Some(TaskState::Succeeded)
        );
        assert_eq!(report.task_state("load_time_dim"), Some(TaskState::Succeeded));

        // The gate never ran a single check.
        assert_eq!(warehouse.query_count(), 0);

        let first = report.first_failure.unwrap();
        assert_eq!(first.task, "load_user_dim");
        assert_eq!(first.failure.kind, ErrorKind::Execution);
        Ok(())
    }

    #[tokio::test]
    async fn test_assertion_failure_fails_the_run_without_retry() -> anyhow::Result<()> {
        let graph = songplay_pipeline(&variables())?;
        let warehouse = Arc::new(MockWarehouse::new());
        script_passing_quality_checks(&warehouse);
        // An empty fact table fails the first check.
        warehouse.set_query_result("SELECT COUNT(*) FROM songplays", vec![vec![Scalar::Int(0)]]);

        let report = graph.execute(&context(warehouse.clone())).await;

        assert_eq!(report.status, RunStatus::Failed);
        let gate = &report.task_runs["quality_checks"];
        assert_eq!(gate.state, TaskState::Failed);
        assert_eq!(gate.attempts, 1);

        let failure = gate.error.as_ref().unwrap();
        assert_eq!(failure.kind, ErrorKind::Assertion);
        assert!(failure.detail.contains("actual: 0 > expected: 0"));

        // Fail-fast: the remaining three checks were never evaluated.
        assert_eq!(warehouse.query_count(), 1);
        assert_eq!(report.task_state("stop"), Some(TaskState::UpstreamFailed));
        Ok(())
    }

    #[tokio::test]
    async fn test_stage_failure_spares_the_independent_branch() -> anyhow::Result<()> {
        let graph = songplay_pipeline(&variables())?;
        let warehouse = Arc::new(MockWarehouse::new());
        warehouse.fail_matching("COPY staging_events", 3);

        let report = graph.execute(&context(warehouse.clone())).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.task_state("stage_events"), Some(TaskState::Failed));
        assert_eq!(
            report.task_state("load_user_dim"),
            Some(TaskState::UpstreamFailed)
        );
        assert_eq!(
            report.task_state("load_songplays_fact"),
            Some(TaskState::UpstreamFailed)
        );

        // The songs branch is unaffected by the events branch failing.
        assert_eq!(report.task_state("stage_songs"), Some(TaskState::Succeeded));
        assert_eq!(report.task_state("load_song_dim"), Some(TaskState::Succeeded));
        assert_eq!(report.task_state("load_artist_dim"), Some(TaskState::Succeeded));
        Ok(())
    }

    #[tokio::test]
    async fn test_flaky_copy_recovers_before_attempts_run_out() -> anyhow::Result<()> {
        let graph = songplay_pipeline(&variables())?;
        let warehouse = Arc::new(MockWarehouse::new());
        script_passing_quality_checks(&warehouse);
        warehouse.fail_connection_matching("COPY staging_events", 2);

        let report = graph.execute(&context(warehouse.clone())).await;

        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(report.task_runs["stage_events"].attempts, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_lifecycle_events_are_emitted() -> anyhow::Result<()> {
        let graph = songplay_pipeline(&variables())?;
        let warehouse = Arc::new(MockWarehouse::new());
        script_passing_quality_checks(&warehouse);
        let events = Arc::new(CollectingEventSink::new());

        let ctx = context(warehouse).with_events(events.clone());
        graph.execute(&ctx).await;

        assert_eq!(events.count("task.started"), 12);
        assert_eq!(events.count("task.succeeded"), 12);
        assert_eq!(events.count("task.failed"), 0);
        assert_eq!(events.count("run.completed"), 1);

        let types = events.event_types();
        assert_eq!(types.first().map(String::as_str), Some("task.started"));
        assert_eq!(types.last().map(String::as_str), Some("run.completed"));
        Ok(())
    }
}
