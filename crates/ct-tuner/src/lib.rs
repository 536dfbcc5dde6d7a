//! # ct-tuner
//!
//! Iterative model-parameter optimization driver for a somatic CNV caller.
//!
//! Each iteration perturbs one tunable parameter at a time, fans the
//! candidate configurations out across the training corpus via a task DAG,
//! aggregates the evaluation metrics per candidate, and folds the top-K
//! candidates back into the base configuration for the next iteration.

pub mod controller;
pub mod metrics;
pub mod mutate;
pub mod selector;

pub use controller::{Controller, IterationOutcome, RunSettings, RunSummary};
pub use metrics::{AggregateRow, SampleResult};
pub use mutate::mutate;
pub use selector::{apply_selection, select_best};
