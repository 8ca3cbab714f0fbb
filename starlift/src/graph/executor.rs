//! DAG execution engine.
//!
//! Tasks are dispatched as soon as every upstream run has succeeded, bounded
//! by the worker pool. A failed task cascades `UpstreamFailed` to its whole
//! downstream transitively; independent siblings keep running, and the run
//! reports `Failed` once nothing is eligible anymore.

use super::cancel::RunCancellation;
use super::state::{FailureSummary, RunReport, RunStatus, TaskRun, TaskState};
use super::task::{Task, TaskPayload};
use crate::config::RunConfig;
use crate::errors::{TaskError, TaskFailure};
use crate::events::{EventSink, NoOpEventSink};
use crate::load::{DimensionLoader, FactLoader, StageLoader};
use crate::providers::CredentialProvider;
use crate::quality::QualityGate;
use crate::warehouse::Warehouse;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Everything a run needs beyond the graph itself: the warehouse, the
/// credential provider, configuration, event sink, and cancellation token.
#[derive(Clone)]
pub struct RunContext {
    /// Warehouse access shared by every task.
    pub warehouse: Arc<dyn Warehouse>,
    /// Object-storage credential provider for staging loads.
    pub credentials: Arc<dyn CredentialProvider>,
    /// Run configuration.
    pub config: RunConfig,
    /// Lifecycle event sink.
    pub events: Arc<dyn EventSink>,
    /// Cooperative cancellation token.
    pub cancellation: Arc<RunCancellation>,
}

impl RunContext {
    /// Creates a context with default configuration and no event sink.
    #[must_use]
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            warehouse,
            credentials,
            config: RunConfig::default(),
            events: Arc::new(NoOpEventSink),
            cancellation: Arc::new(RunCancellation::new()),
        }
    }

    /// Sets the run configuration.
    #[must_use]
    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: Arc<RunCancellation>) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// A validated, immutable task graph.
///
/// Built through [`super::GraphBuilder`]; owns its tasks. Task runs are
/// owned by the executing run and returned in the [`RunReport`].
#[derive(Debug)]
pub struct PipelineGraph {
    name: String,
    tasks: HashMap<String, Task>,
    order: Vec<String>,
    children: HashMap<String, Vec<String>>,
}

impl PipelineGraph {
    pub(crate) fn new(name: String, tasks: HashMap<String, Task>, order: Vec<String>) -> Self {
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for task_name in &order {
            if let Some(task) = tasks.get(task_name) {
                for dep in &task.dependencies {
                    children
                        .entry(dep.clone())
                        .or_default()
                        .push(task_name.clone());
                }
            }
        }
        Self {
            name,
            tasks,
            order,
            children,
        }
    }

    /// The pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of tasks in the graph.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Task names in insertion order.
    #[must_use]
    pub fn task_names(&self) -> &[String] {
        &self.order
    }

    /// Looks up a task by name.
    #[must_use]
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Upstream dependencies of a task.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Option<&[String]> {
        self.tasks.get(name).map(|task| task.dependencies.as_slice())
    }

    /// Direct downstream tasks of a task.
    #[must_use]
    pub fn downstream_of(&self, name: &str) -> &[String] {
        self.children.get(name).map_or(&[], Vec::as_slice)
    }

    /// Executes the graph to completion and reports the outcome.
    ///
    /// Never returns early: every task ends in a terminal state before the
    /// report is assembled.
    pub async fn execute(&self, ctx: &RunContext) -> RunReport {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        info!(
            pipeline = %self.name,
            run_id = %run_id,
            tasks = self.tasks.len(),
            "starting pipeline run"
        );

        let runs: Arc<DashMap<String, TaskRun>> = Arc::new(
            self.order
                .iter()
                .map(|name| (name.clone(), TaskRun::pending(name.clone())))
                .collect(),
        );
        let semaphore = ctx
            .config
            .max_workers
            .map(|workers| Arc::new(Semaphore::new(workers)));

        let mut in_degree: HashMap<String, usize> = self
            .tasks
            .iter()
            .map(|(name, task)| (name.clone(), task.dependencies.len()))
            .collect();

        let mut active: FuturesUnordered<BoxFuture<'static, (String, Result<(), TaskError>)>> =
            FuturesUnordered::new();
        let mut remaining = self.order.len();
        let mut first_failure: Option<FailureSummary> = None;

        if !ctx.cancellation.is_cancelled() {
            for name in &self.order {
                if let Some(task) = self.tasks.get(name) {
                    if task.dependencies.is_empty() {
                        active.push(spawn_task(
                            task.clone(),
                            ctx.clone(),
                            runs.clone(),
                            semaphore.clone(),
                        ));
                    }
                }
            }
        }

        while remaining > 0 && !active.is_empty() {
            let Some((name, result)) = active.next().await else {
                break;
            };

            match result {
                Ok(()) => {
                    finish(&runs, &name, TaskState::Succeeded, None);
                    remaining -= 1;
                    info!(task = %name, "task succeeded");
                    ctx.events
                        .try_emit("task.succeeded", Some(serde_json::json!({ "task": &name })));

                    if ctx.cancellation.is_cancelled() {
                        continue;
                    }

                    for child in self.downstream_of(&name) {
                        let ready = in_degree.get_mut(child).is_some_and(|count| {
                            *count = count.saturating_sub(1);
                            *count == 0
                        });
                        let pending = runs
                            .get(child)
                            .is_some_and(|run| run.state == TaskState::Pending);
                        if ready && pending {
                            if let Some(task) = self.tasks.get(child) {
                                active.push(spawn_task(
                                    task.clone(),
                                    ctx.clone(),
                                    runs.clone(),
                                    semaphore.clone(),
                                ));
                            }
                        }
                    }
                }
                Err(err) => {
                    let failure = TaskFailure::from(&err);
                    error!(task = %name, kind = %failure.kind, error = %err, "task failed");
                    finish(&runs, &name, TaskState::Failed, Some(failure.clone()));
                    remaining -= 1;
                    ctx.events.try_emit(
                        "task.failed",
                        Some(serde_json::json!({
                            "task": &name,
                            "kind": failure.kind.to_string(),
                            "detail": &failure.detail,
                        })),
                    );
                    if first_failure.is_none() {
                        first_failure = Some(FailureSummary {
                            task: name.clone(),
                            failure,
                        });
                    }
                    remaining -= self.cascade_upstream_failure(&name, &runs, ctx);
                }
            }
        }

        // Anything still pending never became eligible (cancellation).
        for name in &self.order {
            let pending = runs
                .get(name)
                .is_some_and(|run| run.state == TaskState::Pending);
            if pending {
                finish(&runs, name, TaskState::Skipped, None);
                ctx.events
                    .try_emit("task.skipped", Some(serde_json::json!({ "task": name })));
            }
        }

        let task_runs: BTreeMap<String, TaskRun> = runs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let status = if task_runs.values().all(|run| run.state.is_success()) {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match (&status, &first_failure) {
            (RunStatus::Succeeded, _) => {
                info!(pipeline = %self.name, run_id = %run_id, duration_ms, "pipeline run succeeded");
            }
            (RunStatus::Failed, Some(summary)) => {
                error!(
                    pipeline = %self.name,
                    run_id = %run_id,
                    failed_task = %summary.task,
                    kind = %summary.failure.kind,
                    detail = %summary.failure.detail,
                    "pipeline run failed"
                );
            }
            (RunStatus::Failed, None) => {
                warn!(pipeline = %self.name, run_id = %run_id, "pipeline run did not complete");
            }
        }
        ctx.events.try_emit(
            "run.completed",
            Some(serde_json::json!({
                "pipeline": &self.name,
                "run_id": run_id.to_string(),
                "status": status.to_string(),
            })),
        );

        RunReport {
            run_id,
            pipeline: self.name.clone(),
            status,
            duration_ms,
            task_runs,
            first_failure,
        }
    }

    /// Marks every pending transitive descendant of a failed task as
    /// `UpstreamFailed`, returning how many were marked.
    fn cascade_upstream_failure(
        &self,
        failed: &str,
        runs: &DashMap<String, TaskRun>,
        ctx: &RunContext,
    ) -> usize {
        let mut marked = 0;
        let mut stack: Vec<&String> = self.downstream_of(failed).iter().collect();

        while let Some(child) = stack.pop() {
            let pending = runs
                .get(child)
                .is_some_and(|run| run.state == TaskState::Pending);
            if pending {
                if let Some(mut run) = runs.get_mut(child.as_str()) {
                    run.state = TaskState::UpstreamFailed;
                    run.finished_at = Some(Utc::now());
                    run.error = Some(TaskFailure::upstream(failed));
                }
                warn!(task = %child, upstream = %failed, "task will not run after upstream failure");
                ctx.events.try_emit(
                    "task.upstream_failed",
                    Some(serde_json::json!({ "task": child, "upstream": failed })),
                );
                marked += 1;
                stack.extend(self.downstream_of(child).iter());
            }
        }
        marked
    }
}

fn finish(
    runs: &DashMap<String, TaskRun>,
    name: &str,
    state: TaskState,
    error: Option<TaskFailure>,
) {
    if let Some(mut run) = runs.get_mut(name) {
        run.state = state;
        run.finished_at = Some(Utc::now());
        run.error = error;
    }
}

/// Spawns one task body onto the runtime. The returned future resolves to
/// the task's name and outcome even if the worker itself dies.
fn spawn_task(
    task: Task,
    ctx: RunContext,
    runs: Arc<DashMap<String, TaskRun>>,
    semaphore: Option<Arc<Semaphore>>,
) -> BoxFuture<'static, (String, Result<(), TaskError>)> {
    let name = task.name.clone();

    let handle = tokio::spawn(async move {
        // A worker slot is held for the task's full duration, retry delays
        // included.
        let _permit = match semaphore {
            Some(semaphore) => semaphore.acquire_owned().await.ok(),
            None => None,
        };

        if let Some(mut run) = runs.get_mut(&task.name) {
            run.state = TaskState::Running;
            run.started_at = Some(Utc::now());
        }
        ctx.events.try_emit(
            "task.started",
            Some(serde_json::json!({
                "task": &task.name,
                "kind": task.kind().to_string(),
            })),
        );

        let result = run_with_retry(&task, &ctx, &runs).await;
        (task.name.clone(), result)
    });

    Box::pin(async move {
        match handle.await {
            Ok(outcome) => outcome,
            Err(err) => (
                name,
                Err(TaskError::Internal {
                    reason: err.to_string(),
                }),
            ),
        }
    })
}

/// Runs the full task body up to the configured number of attempts.
///
/// Retries re-run the body from the top; a retried stage or dimension load
/// re-truncates when its spec says to. Non-retryable kinds and cancellation
/// stop the loop immediately.
async fn run_with_retry(
    task: &Task,
    ctx: &RunContext,
    runs: &DashMap<String, TaskRun>,
) -> Result<(), TaskError> {
    let policy = ctx.config.retry;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if let Some(mut run) = runs.get_mut(&task.name) {
            run.attempts = attempt;
        }

        let outcome = match ctx.config.attempt_timeout {
            Some(ceiling) => match tokio::time::timeout(ceiling, execute_payload(task, ctx)).await
            {
                Ok(result) => result,
                Err(_) => Err(TaskError::AttemptTimeout {
                    timeout_ms: u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX),
                }),
            },
            None => execute_payload(task, ctx).await,
        };

        match outcome {
            Ok(()) => return Ok(()),
            Err(err)
                if err.is_retryable()
                    && attempt < policy.max_attempts
                    && !ctx.cancellation.is_cancelled() =>
            {
                warn!(
                    task = %task.name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "task attempt failed; retrying after delay"
                );
                ctx.events.try_emit(
                    "task.retrying",
                    Some(serde_json::json!({ "task": &task.name, "attempt": attempt })),
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Dispatches a task payload to its executor. This is the whole dispatch
/// surface: a closed set of kinds, one match.
async fn execute_payload(task: &Task, ctx: &RunContext) -> Result<(), TaskError> {
    match &task.payload {
        TaskPayload::NoOp => Ok(()),
        TaskPayload::Sql { statements } => {
            for sql in statements {
                ctx.warehouse.execute(sql).await?;
            }
            Ok(())
        }
        TaskPayload::Stage(spec) => {
            StageLoader::new(ctx.warehouse.as_ref(), ctx.credentials.as_ref())
                .stage(spec)
                .await?;
            Ok(())
        }
        TaskPayload::FactLoad(spec) => {
            FactLoader::new(ctx.warehouse.as_ref()).load(spec).await?;
            Ok(())
        }
        TaskPayload::DimensionLoad(spec) => {
            DimensionLoader::new(ctx.warehouse.as_ref()).load(spec).await?;
            Ok(())
        }
        TaskPayload::QualityCheck { assertions } => {
            QualityGate::new(ctx.warehouse.as_ref())
                .run_checks(assertions)
                .await?;
            Ok(())
        }
    }
}
