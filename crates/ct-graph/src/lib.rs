//! # ct-graph
//!
//! Declarative per-iteration task DAG for CopyTune: compute and evaluation
//! task construction, graph validation, and the executor abstraction the
//! iteration controller hands graphs to. The in-repo [`LocalExecutor`]
//! runs tasks as child processes on a thread worker pool; cluster
//! substrates plug in behind the same [`TaskExecutor`] trait.

pub mod builder;
pub mod executor;
pub mod task;

pub use builder::{
    build_candidate_tasks, candidate_dir, iteration_dir, GraphContext, CALLER_OUTPUT, CONFIG_FILE,
    RESULTS_FILE,
};
pub use executor::{
    GraphReport, LocalExecutor, ResourcePlan, RunMode, TaskExecutor, TaskOutcome,
};
pub use task::{RetryMode, Task, TaskGraph, TaskId};
