//! Declarative task model: what the executor runs, never how.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use ct_types::{CtResult, GraphError};

/// Unique task identifier within one iteration's graph.
pub type TaskId = String;

/// How the executor treats a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryMode {
    /// Retry every failure class, up to the task's retry budget.
    All,
}

/// A single schedulable unit of work. Never mutated after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// argv: program followed by its arguments.
    pub command: Vec<String>,
    pub memory_mb: u64,
    /// Additional attempts after the first failure.
    pub retry_max: u32,
    pub retry_mode: RetryMode,
    pub dependencies: Vec<TaskId>,
}

/// Static DAG handed to the executor for one iteration.
///
/// Submission is declarative: tasks accumulate here and nothing runs until
/// an executor is given the whole graph.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    ids: HashSet<TaskId>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a task. Duplicate ids are a graph construction error.
    pub fn submit(&mut self, task: Task) -> CtResult<()> {
        if !self.ids.insert(task.id.clone()) {
            return Err(GraphError::DuplicateTask { id: task.id }.into());
        }
        self.tasks.push(task);
        Ok(())
    }

    /// Tasks in submission order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Every dependency must name a submitted task, and the dependency
    /// relation must be acyclic.
    pub fn validate(&self) -> CtResult<()> {
        for task in &self.tasks {
            for dependency in &task.dependencies {
                if !self.ids.contains(dependency) {
                    return Err(GraphError::UnknownDependency {
                        id: task.id.clone(),
                        dependency: dependency.clone(),
                    }
                    .into());
                }
            }
        }

        // Kahn's algorithm; anything left unprocessed sits on a cycle.
        let mut indegree: HashMap<&str, usize> = self
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), t.dependencies.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for task in &self.tasks {
            for dependency in &task.dependencies {
                dependents
                    .entry(dependency.as_str())
                    .or_default()
                    .push(task.id.as_str());
            }
        }
        let mut ready: Vec<&str> = indegree
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut processed = 0usize;
        while let Some(id) = ready.pop() {
            processed += 1;
            for dependent in dependents.get(id).into_iter().flatten() {
                let n = indegree.get_mut(dependent).expect("dependent indexed");
                *n -= 1;
                if *n == 0 {
                    ready.push(dependent);
                }
            }
        }
        if processed < self.tasks.len() {
            let stuck = self
                .tasks
                .iter()
                .find(|t| indegree.get(t.id.as_str()).copied().unwrap_or(0) > 0)
                .map(|t| t.id.clone())
                .unwrap_or_default();
            return Err(GraphError::Cycle { id: stuck }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            command: vec!["true".to_string()],
            memory_mb: 1024,
            retry_max: 3,
            retry_mode: RetryMode::All,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut graph = TaskGraph::new();
        graph.submit(task("a", &[])).unwrap();
        let err = graph.submit(task("a", &[])).unwrap_err();
        match err {
            ct_types::CtError::Graph(GraphError::DuplicateTask { id }) => assert_eq!(id, "a"),
            other => panic!("expected DuplicateTask, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_dependency_rejected() {
        let mut graph = TaskGraph::new();
        graph.submit(task("a", &["ghost"])).unwrap();
        let err = graph.validate().unwrap_err();
        match err {
            ct_types::CtError::Graph(GraphError::UnknownDependency { dependency, .. }) => {
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected UnknownDependency, got: {other:?}"),
        }
    }

    #[test]
    fn cycle_rejected() {
        let mut graph = TaskGraph::new();
        graph.submit(task("a", &["b"])).unwrap();
        graph.submit(task("b", &["a"])).unwrap();
        assert!(matches!(
            graph.validate().unwrap_err(),
            ct_types::CtError::Graph(GraphError::Cycle { .. })
        ));
    }

    #[test]
    fn valid_dag_passes() {
        let mut graph = TaskGraph::new();
        graph.submit(task("compute", &[])).unwrap();
        graph.submit(task("evaluate", &["compute"])).unwrap();
        graph.validate().unwrap();
        assert_eq!(graph.len(), 2);
        assert!(graph.contains("evaluate"));
    }

    #[test]
    fn task_round_trips_through_json() {
        let t = task("caller_D_1.5_HCC2218", &["x"]);
        let json = serde_json::to_string(&t).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
