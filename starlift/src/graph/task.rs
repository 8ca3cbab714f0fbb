//! Task definitions: a name, a kind-specific payload, and upstream edges.
//!
//! Kinds are a closed set dispatched by the executor; there is no operator
//! inheritance hierarchy to extend.

use crate::load::{DimensionSpec, FactSpec, StageSpec};
use crate::quality::QualityAssertion;
use serde::{Deserialize, Serialize};

/// The kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Structural marker, does nothing.
    NoOp,
    /// Plain warehouse statements (DDL, maintenance).
    Sql,
    /// Object storage into a landing table.
    Stage,
    /// Append into the fact table.
    FactLoad,
    /// Rebuild (or append to) a dimension table.
    DimensionLoad,
    /// Data-quality gate.
    QualityCheck,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOp => write!(f, "no_op"),
            Self::Sql => write!(f, "sql"),
            Self::Stage => write!(f, "stage"),
            Self::FactLoad => write!(f, "fact_load"),
            Self::DimensionLoad => write!(f, "dimension_load"),
            Self::QualityCheck => write!(f, "quality_check"),
        }
    }
}

/// Kind-specific task configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskPayload {
    /// Structural marker.
    NoOp,
    /// Statements executed in order; the first failure stops the batch.
    Sql {
        /// The statements to run.
        statements: Vec<String>,
    },
    /// Staging load.
    Stage(StageSpec),
    /// Fact load.
    FactLoad(FactSpec),
    /// Dimension load.
    DimensionLoad(DimensionSpec),
    /// Quality gate.
    QualityCheck {
        /// Checks evaluated strictly in order.
        assertions: Vec<QualityAssertion>,
    },
}

impl TaskPayload {
    /// The kind this payload executes as.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::NoOp => TaskKind::NoOp,
            Self::Sql { .. } => TaskKind::Sql,
            Self::Stage(_) => TaskKind::Stage,
            Self::FactLoad(_) => TaskKind::FactLoad,
            Self::DimensionLoad(_) => TaskKind::DimensionLoad,
            Self::QualityCheck { .. } => TaskKind::QualityCheck,
        }
    }

    /// Table and column identifiers this payload interpolates into SQL.
    /// The graph builder runs these through the identifier guard.
    pub(crate) fn identifiers(&self) -> Vec<&str> {
        match self {
            Self::NoOp | Self::Sql { .. } | Self::QualityCheck { .. } => Vec::new(),
            Self::Stage(spec) => vec![spec.table.as_str()],
            Self::FactLoad(spec) => {
                let mut names = vec![spec.table.as_str()];
                names.extend(spec.columns.iter().map(String::as_str));
                names
            }
            Self::DimensionLoad(spec) => vec![spec.table.as_str()],
        }
    }
}

/// One node of the pipeline graph. Immutable once the graph is finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique name within the graph.
    pub name: String,
    /// Kind-specific configuration.
    pub payload: TaskPayload,
    /// Names of upstream tasks this task waits for.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Task {
    fn with_payload(name: impl Into<String>, payload: TaskPayload) -> Self {
        Self {
            name: name.into(),
            payload,
            dependencies: Vec::new(),
        }
    }

    /// A structural marker task.
    #[must_use]
    pub fn no_op(name: impl Into<String>) -> Self {
        Self::with_payload(name, TaskPayload::NoOp)
    }

    /// A plain-SQL task running statements in order.
    #[must_use]
    pub fn sql(name: impl Into<String>, statements: Vec<String>) -> Self {
        Self::with_payload(name, TaskPayload::Sql { statements })
    }

    /// A staging-load task.
    #[must_use]
    pub fn stage(name: impl Into<String>, spec: StageSpec) -> Self {
        Self::with_payload(name, TaskPayload::Stage(spec))
    }

    /// A fact-load task.
    #[must_use]
    pub fn fact(name: impl Into<String>, spec: FactSpec) -> Self {
        Self::with_payload(name, TaskPayload::FactLoad(spec))
    }

    /// A dimension-load task.
    #[must_use]
    pub fn dimension(name: impl Into<String>, spec: DimensionSpec) -> Self {
        Self::with_payload(name, TaskPayload::DimensionLoad(spec))
    }

    /// A quality-gate task.
    #[must_use]
    pub fn quality(name: impl Into<String>, assertions: Vec<QualityAssertion>) -> Self {
        Self::with_payload(name, TaskPayload::QualityCheck { assertions })
    }

    /// Declares upstream dependencies.
    #[must_use]
    pub fn after(mut self, dependencies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for dep in dependencies {
            let dep = dep.into();
            if !self.dependencies.contains(&dep) {
                self.dependencies.push(dep);
            }
        }
        self
    }

    /// The task's kind.
    #[must_use]
    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kinds() {
        assert_eq!(Task::no_op("start").kind(), TaskKind::NoOp);
        assert_eq!(
            Task::sql("drop_tables", vec!["DROP TABLE IF EXISTS users".into()]).kind(),
            TaskKind::Sql
        );
        assert_eq!(
            Task::quality("quality_checks", Vec::new()).kind(),
            TaskKind::QualityCheck
        );
    }

    #[test]
    fn test_after_deduplicates() {
        let task = Task::no_op("stop")
            .after(["a", "b"])
            .after(["b", "c"]);
        assert_eq!(task.dependencies, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_fact_payload_surfaces_identifiers() {
        let task = Task::fact(
            "load_songplays_fact",
            FactSpec::new("songplays", ["songplay_id", "start_time"], "SELECT 1"),
        );
        assert_eq!(
            task.payload.identifiers(),
            vec!["songplays", "songplay_id", "start_time"]
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(TaskKind::FactLoad.to_string(), "fact_load");
        assert_eq!(TaskKind::QualityCheck.to_string(), "quality_check");
    }
}
