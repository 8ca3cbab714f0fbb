//! Task run state machine and the run report.

use crate::errors::TaskFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The execution state of one task within a run.
///
/// `Pending → Running → {Succeeded | Failed}`; a task whose any upstream
/// failed goes `Pending → UpstreamFailed` without running, and a cancelled
/// run moves never-started tasks to `Skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting on upstream tasks.
    #[default]
    Pending,
    /// An attempt is in flight.
    Running,
    /// Terminal: the task body completed.
    Succeeded,
    /// Terminal: retries exhausted or a non-retryable error.
    Failed,
    /// Terminal: the run was cancelled before this task started.
    Skipped,
    /// Terminal: an upstream task failed; this task never ran.
    UpstreamFailed,
}

impl TaskState {
    /// Returns true for terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::UpstreamFailed
        )
    }

    /// Returns true only for [`TaskState::Succeeded`].
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::UpstreamFailed => write!(f, "upstream_failed"),
        }
    }
}

/// Execution record of one task within a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    /// The task's name.
    pub task: String,
    /// Current state.
    pub state: TaskState,
    /// Number of attempts made so far.
    pub attempts: u32,
    /// When the first attempt started. `None` if the task never ran.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure detail for `Failed` and `UpstreamFailed`.
    pub error: Option<TaskFailure>,
}

impl TaskRun {
    /// Creates a pending run record for a task.
    #[must_use]
    pub fn pending(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            state: TaskState::Pending,
            attempts: 0,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

/// The run's single terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every task succeeded.
    Succeeded,
    /// At least one task failed, was skipped, or never became eligible.
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// The first task that failed, with its classified error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureSummary {
    /// The failed task's name.
    pub task: String,
    /// Kind and diagnostic payload.
    pub failure: TaskFailure,
}

/// Everything a caller learns about a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// The pipeline's name.
    pub pipeline: String,
    /// Terminal status.
    pub status: RunStatus,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
    /// Per-task execution records.
    pub task_runs: BTreeMap<String, TaskRun>,
    /// The first failed task, when the run failed because of one.
    pub first_failure: Option<FailureSummary>,
}

impl RunReport {
    /// Returns true if the run succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// State of a task in this run, if it exists.
    #[must_use]
    pub fn task_state(&self, task: &str) -> Option<TaskState> {
        self.task_runs.get(task).map(|run| run.state)
    }

    /// Names of tasks in a given state.
    #[must_use]
    pub fn tasks_in_state(&self, state: TaskState) -> Vec<&str> {
        self.task_runs
            .values()
            .filter(|run| run.state == state)
            .map(|run| run.task.as_str())
            .collect()
    }
}
