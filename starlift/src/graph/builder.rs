//! Graph builder with validation.
//!
//! Validation happens as tasks are added: duplicate names, self-dependency,
//! unknown dependencies, bad identifiers, and cycles are all rejected before
//! a [`PipelineGraph`] exists. A finalized graph needs no further checks.

use super::executor::PipelineGraph;
use super::task::Task;
use crate::errors::ConfigError;
use crate::identifier::validate_identifiers;
use std::collections::{HashMap, HashSet};

/// Builder for validated pipeline graphs.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    name: String,
    tasks: HashMap<String, Task>,
    order: Vec<String>,
}

impl GraphBuilder {
    /// Creates a builder for a named pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Adds a task, validating it against the graph built so far.
    ///
    /// Dependencies must reference tasks added earlier, which also rules
    /// out forward edges that could close a cycle.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateTask`], [`ConfigError::SelfDependency`],
    /// [`ConfigError::UnknownDependency`], [`ConfigError::InvalidIdentifier`],
    /// or [`ConfigError::CycleDetected`].
    pub fn task(mut self, task: Task) -> Result<Self, ConfigError> {
        if self.tasks.contains_key(&task.name) {
            return Err(ConfigError::DuplicateTask {
                name: task.name.clone(),
            });
        }
        if task.dependencies.contains(&task.name) {
            return Err(ConfigError::SelfDependency {
                task: task.name.clone(),
            });
        }
        for dep in &task.dependencies {
            if !self.tasks.contains_key(dep) {
                return Err(ConfigError::UnknownDependency {
                    task: task.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        validate_identifiers(task.payload.identifiers())?;

        self.order.push(task.name.clone());
        self.tasks.insert(task.name.clone(), task);

        self.detect_cycles()?;
        Ok(self)
    }

    /// Finalizes the graph.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyGraph`] when no tasks were added.
    pub fn build(self) -> Result<PipelineGraph, ConfigError> {
        if self.tasks.is_empty() {
            return Err(ConfigError::EmptyGraph);
        }
        Ok(PipelineGraph::new(self.name, self.tasks, self.order))
    }

    /// Returns the number of tasks added so far.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    fn detect_cycles(&self) -> Result<(), ConfigError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for name in self.tasks.keys() {
            if !visited.contains(name) {
                if let Some(cycle) =
                    self.dfs_cycle(name, &mut visited, &mut rec_stack, &mut path)
                {
                    return Err(ConfigError::CycleDetected { path: cycle });
                }
            }
        }
        Ok(())
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_owned());
        rec_stack.insert(node.to_owned());
        path.push(node.to_owned());

        if let Some(task) = self.tasks.get(node) {
            for dep in &task.dependencies {
                if !visited.contains(dep) {
                    if let Some(cycle) = self.dfs_cycle(dep, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(dep) {
                    let start = path.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::DimensionSpec;

    #[test]
    fn test_builds_a_linear_graph() {
        let graph = GraphBuilder::new("test")
            .task(Task::no_op("start"))
            .unwrap()
            .task(Task::no_op("stop").after(["start"]))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(graph.task_count(), 2);
        assert_eq!(graph.name(), "test");
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = GraphBuilder::new("test")
            .task(Task::no_op("start"))
            .unwrap()
            .task(Task::no_op("start"))
            .unwrap_err();

        assert_eq!(err, ConfigError::DuplicateTask { name: "start".into() });
    }

    #[test]
    fn test_rejects_unknown_dependency() {
        let err = GraphBuilder::new("test")
            .task(Task::no_op("stop").after(["missing"]))
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::UnknownDependency {
                task: "stop".into(),
                dependency: "missing".into()
            }
        );
    }

    #[test]
    fn test_rejects_self_dependency() {
        let err = GraphBuilder::new("test")
            .task(Task::no_op("loop").after(["loop"]))
            .unwrap_err();

        assert_eq!(err, ConfigError::SelfDependency { task: "loop".into() });
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        let spec = DimensionSpec::new("users; DROP TABLE users", "SELECT 1");
        let err = GraphBuilder::new("test")
            .task(Task::dimension("load_users", spec))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_rejects_empty_graph() {
        let err = GraphBuilder::new("test").build().unwrap_err();
        assert_eq!(err, ConfigError::EmptyGraph);
    }
}
