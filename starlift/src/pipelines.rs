//! The songplay warehouse pipeline.
//!
//! Assembles the fixed topology from run-scoped variables: drop and recreate
//! the schema, stage events and songs from object storage, load the fact and
//! the four dimensions, then gate on data quality.

use crate::catalog;
use crate::errors::ConfigError;
use crate::graph::{GraphBuilder, PipelineGraph, Task};
use crate::load::{DimensionSpec, FactSpec, StageSpec};
use crate::providers::VariableStore;
use crate::quality::{Comparator, QualityAssertion};

/// Name of the songplay pipeline.
pub const PIPELINE_NAME: &str = "songplay_warehouse";

/// The default quality suite: the fact and catalog dimensions must be
/// non-empty and no user row may have a null id.
#[must_use]
pub fn default_quality_checks() -> Vec<QualityAssertion> {
    vec![
        QualityAssertion::new("SELECT COUNT(*) FROM songplays", 0i64)
            .with_comparator(Comparator::Gt),
        QualityAssertion::new("SELECT COUNT(*) FROM users WHERE userid IS NULL", 0i64),
        QualityAssertion::new("SELECT COUNT(*) FROM songs", 0i64).with_comparator(Comparator::Gt),
        QualityAssertion::new("SELECT COUNT(*) FROM artists", 0i64)
            .with_comparator(Comparator::Gt),
    ]
}

/// Builds the songplay pipeline graph.
///
/// Bucket and key prefix come from the variable store at graph-build time.
/// The fact load waits only on the two staging tasks; it races the dimension
/// loads intentionally, and its source query joins the staging tables
/// directly.
///
/// # Errors
///
/// [`ConfigError::MissingVariable`] when `s3_bucket` or `s3_prefix` is not
/// set; graph validation errors cannot occur for this fixed shape.
pub fn songplay_pipeline(variables: &dyn VariableStore) -> Result<PipelineGraph, ConfigError> {
    let bucket = required_variable(variables, "s3_bucket")?;
    let prefix = required_variable(variables, "s3_prefix")?;

    let events = StageSpec::new("staging_events", &bucket, format!("{prefix}/log-data"))
        .with_json_path(format!("s3://{bucket}/{prefix}/log_json_path.json"))
        .with_timeformat("epochmillisecs");
    let songs = StageSpec::new("staging_songs", &bucket, format!("{prefix}/song-data"));

    GraphBuilder::new(PIPELINE_NAME)
        .task(Task::no_op("start"))?
        .task(Task::sql("drop_tables", catalog::drop_statements()).after(["start"]))?
        .task(Task::sql("create_tables", catalog::create_statements()).after(["drop_tables"]))?
        .task(Task::stage("stage_events", events).after(["create_tables"]))?
        .task(Task::stage("stage_songs", songs).after(["create_tables"]))?
        .task(
            Task::dimension("load_song_dim", DimensionSpec::new("songs", catalog::SONG_INSERT))
                .after(["stage_songs"]),
        )?
        .task(
            Task::dimension(
                "load_artist_dim",
                DimensionSpec::new("artists", catalog::ARTIST_INSERT),
            )
            .after(["stage_songs"]),
        )?
        .task(
            Task::dimension("load_user_dim", DimensionSpec::new("users", catalog::USER_INSERT))
                .after(["stage_events"]),
        )?
        .task(
            Task::fact(
                "load_songplays_fact",
                FactSpec::new(
                    "songplays",
                    catalog::SONGPLAY_COLUMNS,
                    catalog::SONGPLAY_INSERT,
                ),
            )
            .after(["stage_events", "stage_songs"]),
        )?
        .task(
            Task::dimension("load_time_dim", DimensionSpec::new("time", catalog::TIME_INSERT))
                .after(["load_songplays_fact"]),
        )?
        .task(
            Task::quality("quality_checks", default_quality_checks()).after([
                "load_songplays_fact",
                "load_user_dim",
                "load_song_dim",
                "load_artist_dim",
                "load_time_dim",
            ]),
        )?
        .task(Task::no_op("stop").after(["quality_checks"]))?
        .build()
}

fn required_variable(
    variables: &dyn VariableStore,
    name: &str,
) -> Result<String, ConfigError> {
    variables.get(name).ok_or_else(|| ConfigError::MissingVariable {
        name: name.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TaskKind;
    use crate::providers::InMemoryVariables;
    use pretty_assertions::assert_eq;

    fn variables() -> InMemoryVariables {
        InMemoryVariables::new()
            .with("s3_bucket", "udacity-dend")
            .with("s3_prefix", "data-pipelines")
    }

    #[test]
    fn test_missing_bucket_variable() {
        let err = songplay_pipeline(&InMemoryVariables::new()).unwrap_err();
        assert_eq!(err, ConfigError::MissingVariable { name: "s3_bucket".into() });
    }

    #[test]
    fn test_pipeline_has_the_fixed_shape() {
        let graph = songplay_pipeline(&variables()).unwrap();
        assert_eq!(graph.task_count(), 12);

        let deps = |name: &str| graph.dependencies_of(name).unwrap().to_vec();
        assert!(deps("start").is_empty());
        assert_eq!(deps("drop_tables"), ["start"]);
        assert_eq!(deps("create_tables"), ["drop_tables"]);
        assert_eq!(deps("stage_events"), ["create_tables"]);
        assert_eq!(deps("stage_songs"), ["create_tables"]);
        assert_eq!(deps("load_song_dim"), ["stage_songs"]);
        assert_eq!(deps("load_artist_dim"), ["stage_songs"]);
        assert_eq!(deps("load_user_dim"), ["stage_events"]);
        assert_eq!(deps("load_songplays_fact"), ["stage_events", "stage_songs"]);
        assert_eq!(deps("load_time_dim"), ["load_songplays_fact"]);
        assert_eq!(
            deps("quality_checks"),
            [
                "load_songplays_fact",
                "load_user_dim",
                "load_song_dim",
                "load_artist_dim",
                "load_time_dim",
            ]
        );
        assert_eq!(deps("stop"), ["quality_checks"]);
    }

    #[test]
    fn test_task_kinds_match_their_roles() {
        let graph = songplay_pipeline(&variables()).unwrap();
        let kind = |name: &str| graph.task(name).unwrap().kind();

        assert_eq!(kind("start"), TaskKind::NoOp);
        assert_eq!(kind("drop_tables"), TaskKind::Sql);
        assert_eq!(kind("stage_events"), TaskKind::Stage);
        assert_eq!(kind("load_songplays_fact"), TaskKind::FactLoad);
        assert_eq!(kind("load_user_dim"), TaskKind::DimensionLoad);
        assert_eq!(kind("quality_checks"), TaskKind::QualityCheck);
    }

    #[test]
    fn test_staging_specs_resolve_variables() {
        let graph = songplay_pipeline(&variables()).unwrap();

        let events = match &graph.task("stage_events").unwrap().payload {
            crate::graph::TaskPayload::Stage(spec) => spec.clone(),
            other => panic!("unexpected payload: {other:?}"),
        };
        assert_eq!(events.s3_path(), "s3://udacity-dend/data-pipelines/log-data");
        assert_eq!(events.timeformat.as_deref(), Some("epochmillisecs"));

        let songs = match &graph.task("stage_songs").unwrap().payload {
            crate::graph::TaskPayload::Stage(spec) => spec.clone(),
            other => panic!("unexpected payload: {other:?}"),
        };
        assert_eq!(songs.s3_path(), "s3://udacity-dend/data-pipelines/song-data");
        assert_eq!(songs.json_format, crate::load::JsonFormat::Auto);
    }

    #[test]
    fn test_default_quality_suite() {
        let checks = default_quality_checks();
        assert_eq!(checks.len(), 4);
        assert_eq!(checks[0].comparison, ">");
        assert_eq!(checks[1].comparison, "==");
        assert!(checks[1].query.contains("userid IS NULL"));
    }
}
