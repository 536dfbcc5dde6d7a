//! Executor abstraction and the local worker-pool implementation.
//!
//! The iteration controller builds a [`TaskGraph`](crate::TaskGraph) and
//! blocks on [`TaskExecutor::run_graph`]; that return is the single fan-in
//! barrier per iteration. [`LocalExecutor`] runs tasks as child processes
//! across a fixed pool of threads, honoring dependency edges and each
//! task's retry budget. A failed task never halts its siblings — only its
//! dependents are skipped.

use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::process::Command;
use std::thread;

use tracing::{debug, info, warn};

use ct_types::{CtResult, GraphError};

use crate::task::{Task, TaskGraph, TaskId};

/// Where the graph runs. Placement is owned by the substrate; the mode
/// only drives resource planning here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    Local,
    Distributed,
}

/// Fixed per-task budget when a cluster scheduler owns placement.
const DISTRIBUTED_TASK_MEMORY_MB: u64 = 8192;
/// Used when total system memory cannot be determined.
const FALLBACK_TOTAL_MEMORY_MB: u64 = 16 * 1024;

/// Concurrency and per-task memory for one graph run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePlan {
    pub concurrency: usize,
    pub task_memory_mb: u64,
}

impl ResourcePlan {
    /// Local mode divides total memory evenly across cores; distributed
    /// mode requests a fixed budget per task.
    pub fn for_mode(mode: RunMode) -> Self {
        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let task_memory_mb = match mode {
            RunMode::Local => (total_memory_mb() / cores as u64).max(1),
            RunMode::Distributed => DISTRIBUTED_TASK_MEMORY_MB,
        };
        Self {
            concurrency: cores,
            task_memory_mb,
        }
    }
}

fn total_memory_mb() -> u64 {
    // /proc/meminfo is authoritative on the platforms the tuner runs on.
    if let Ok(text) = std::fs::read_to_string("/proc/meminfo") {
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                if let Some(kb) = rest
                    .split_whitespace()
                    .next()
                    .and_then(|v| v.parse::<u64>().ok())
                {
                    return (kb / 1024).max(1);
                }
            }
        }
    }
    FALLBACK_TOTAL_MEMORY_MB
}

/// Terminal state of one task after a graph run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// Exit status 0 on attempt `attempts`.
    Succeeded { attempts: u32 },
    /// Retry budget exhausted; sibling tasks keep running.
    Failed { attempts: u32, error: String },
    /// Never started because `dependency` did not succeed.
    Skipped { dependency: TaskId },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Per-task statuses for one completed graph run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphReport {
    pub outcomes: HashMap<TaskId, TaskOutcome>,
}

impl GraphReport {
    pub fn is_success(&self, id: &str) -> bool {
        self.outcomes.get(id).is_some_and(TaskOutcome::is_success)
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    /// Failed plus skipped tasks.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Contract between graph construction and the execution substrate.
///
/// Implementations run every task to completion (success, exhausted
/// retries, or skip), honoring dependency edges, and return once no task
/// is runnable.
pub trait TaskExecutor {
    fn run_graph(&self, graph: &TaskGraph, plan: &ResourcePlan) -> CtResult<GraphReport>;
}

/// Thread worker pool running tasks as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl TaskExecutor for LocalExecutor {
    fn run_graph(&self, graph: &TaskGraph, plan: &ResourcePlan) -> CtResult<GraphReport> {
        graph.validate()?;
        if graph.is_empty() {
            return Ok(GraphReport::default());
        }

        let workers = plan.concurrency.min(graph.len()).max(1);
        info!(tasks = graph.len(), workers, "running task graph");

        let (ready_tx, ready_rx) = unbounded::<Task>();
        let (done_tx, done_rx) = unbounded::<(TaskId, bool)>();
        let outcomes: Mutex<HashMap<TaskId, TaskOutcome>> = Mutex::new(HashMap::new());

        let scheduled: CtResult<()> = thread::scope(|scope| {
            for _ in 0..workers {
                let ready_rx = ready_rx.clone();
                let done_tx = done_tx.clone();
                let outcomes = &outcomes;
                scope.spawn(move || {
                    while let Ok(task) = ready_rx.recv() {
                        let outcome = run_task(&task);
                        let ok = outcome.is_success();
                        outcomes.lock().insert(task.id.clone(), outcome);
                        if done_tx.send((task.id, ok)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(done_tx);
            drop(ready_rx);

            let tasks: HashMap<&str, &Task> =
                graph.tasks().iter().map(|t| (t.id.as_str(), t)).collect();
            let mut indegree: HashMap<&str, usize> = graph
                .tasks()
                .iter()
                .map(|t| (t.id.as_str(), t.dependencies.len()))
                .collect();
            let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
            for task in graph.tasks() {
                for dependency in &task.dependencies {
                    dependents
                        .entry(dependency.as_str())
                        .or_default()
                        .push(task.id.as_str());
                }
            }

            for task in graph.tasks() {
                if task.dependencies.is_empty() {
                    let _ = ready_tx.send(task.clone());
                }
            }

            // Ids settled by the skip cascade; they must never be enqueued
            // even if another parent later succeeds.
            let mut skipped: HashSet<&str> = HashSet::new();
            let mut finished = 0usize;
            while finished < graph.len() {
                let (id, ok) = done_rx.recv().map_err(|_| {
                    ct_types::CtError::from(GraphError::ExecutorFailed {
                        message: "worker pool disconnected".to_string(),
                    })
                })?;
                finished += 1;

                if ok {
                    for dependent in dependents.get(id.as_str()).into_iter().flatten() {
                        let waiting = indegree.get_mut(dependent).expect("dependent indexed");
                        *waiting -= 1;
                        if *waiting == 0 && !skipped.contains(dependent) {
                            let _ = ready_tx.send((*tasks[dependent]).clone());
                        }
                    }
                } else {
                    let mut cascade: Vec<(&str, TaskId)> = dependents
                        .get(id.as_str())
                        .into_iter()
                        .flatten()
                        .map(|d| (*d, id.clone()))
                        .collect();
                    while let Some((child, parent)) = cascade.pop() {
                        if !skipped.insert(child) {
                            continue;
                        }
                        warn!(task = child, dependency = %parent, "skipping task: dependency failed");
                        outcomes.lock().insert(
                            child.to_string(),
                            TaskOutcome::Skipped { dependency: parent },
                        );
                        finished += 1;
                        for grandchild in dependents.get(child).into_iter().flatten() {
                            cascade.push((*grandchild, child.to_string()));
                        }
                    }
                }
            }
            drop(ready_tx);
            Ok(())
        });
        scheduled?;

        let report = GraphReport {
            outcomes: outcomes.into_inner(),
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "task graph complete"
        );
        Ok(report)
    }
}

/// Run one task to a terminal outcome, retrying every failure class up to
/// its retry budget.
fn run_task(task: &Task) -> TaskOutcome {
    let attempts_allowed = task.retry_max + 1;
    let mut last_error = String::new();
    for attempt in 1..=attempts_allowed {
        debug!(task = %task.id, attempt, "launching task");
        match launch(&task.command) {
            Ok(status) if status.success() => return TaskOutcome::Succeeded { attempts: attempt },
            Ok(status) => last_error = status.to_string(),
            Err(e) => last_error = e.to_string(),
        }
        warn!(task = %task.id, attempt, error = %last_error, "task attempt failed");
    }
    TaskOutcome::Failed {
        attempts: attempts_allowed,
        error: last_error,
    }
}

fn launch(command: &[String]) -> std::io::Result<std::process::ExitStatus> {
    let (program, args) = command.split_first().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
    })?;
    Command::new(program).args(args).status()
}
