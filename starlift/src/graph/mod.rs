//! The pipeline graph: task definitions, validation, and the DAG executor.

mod builder;
mod cancel;
mod executor;
mod integration_tests;
mod state;
mod task;

pub use builder::GraphBuilder;
pub use cancel::RunCancellation;
pub use executor::{PipelineGraph, RunContext};
pub use state::{FailureSummary, RunReport, RunStatus, TaskRun, TaskState};
pub use task::{Task, TaskKind, TaskPayload};
