//! # Starlift
//!
//! An ELT orchestration pipeline that stages raw event and catalog data from
//! object storage into a warehouse, transforms it into a star schema, and
//! gates completion on data-quality assertions.
//!
//! The core is a dependency-ordered task graph with typed task kinds:
//!
//! - **Staging loads**: bulk-copy raw JSON from object storage into landing tables
//! - **Fact and dimension loads**: query-derived inserts with append vs. replace semantics
//! - **Quality gate**: ordered scalar assertions with fail-fast semantics
//! - **Graph execution**: readiness from the DAG, uniform retries, timeout,
//!   cancellation, and transitive failure propagation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use starlift::prelude::*;
//! use std::sync::Arc;
//!
//! let graph = songplay_pipeline(&EnvVariables::new())?;
//! let ctx = RunContext::new(warehouse, credentials);
//! let report = graph.execute(&ctx).await;
//! assert!(report.is_success());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod catalog;
pub mod config;
pub mod errors;
pub mod events;
pub mod graph;
pub mod identifier;
pub mod load;
pub mod pipelines;
pub mod providers;
pub mod quality;
pub mod testing;
pub mod warehouse;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{RetryPolicy, RunConfig};
    pub use crate::errors::{
        ConfigError, ErrorKind, LoadError, QualityError, StageError, TaskError, TaskFailure,
        WarehouseError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::graph::{
        GraphBuilder, PipelineGraph, RunCancellation, RunContext, RunReport, RunStatus, Task,
        TaskKind, TaskPayload, TaskRun, TaskState,
    };
    pub use crate::load::{
        DimensionLoader, DimensionSpec, FactLoader, FactSpec, JsonFormat, StageLoader, StageSpec,
    };
    pub use crate::pipelines::{default_quality_checks, songplay_pipeline};
    pub use crate::providers::{
        CredentialProvider, EnvVariables, InMemoryVariables, StaticCredentials,
        StorageCredentials, VariableStore,
    };
    pub use crate::quality::{Comparator, QualityAssertion, QualityGate};
    pub use crate::warehouse::{Row, Scalar, Warehouse};
}
