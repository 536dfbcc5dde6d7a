//! Iteration controller: `Init → {Mutate → Execute → Aggregate → Select} × N`.
//!
//! Iterations are strictly sequential — iteration `i` reads its base
//! configuration from iteration `i-1`'s Select output (or the supplied
//! initial config at `i = 0`). Within an iteration, one candidate is
//! produced per tunable parameter and their compute/evaluation fan-outs
//! are mutually independent, so they all go into a single task graph.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

use tracing::{info, warn};

use ct_corpus::load_manifest;
use ct_graph::{
    build_candidate_tasks, candidate_dir, iteration_dir, GraphContext, ResourcePlan, RunMode,
    TaskExecutor, TaskGraph, CONFIG_FILE, RESULTS_FILE,
};
use ct_types::{config_error, Candidate, CtResult, MutationSpec, ParameterConfig, SampleRecord};

use crate::metrics;
use crate::mutate::mutate;
use crate::selector;

/// Default iteration bound; tunable from the CLI.
pub const DEFAULT_ITERATIONS: usize = 40;
/// Default per-task retry budget; tunable from the CLI.
pub const DEFAULT_RETRY_MAX: u32 = 3;

const SUMMARY_FILE: &str = "RunSummary.json";

/// Everything one tuning run needs, constructed once at startup and passed
/// by reference through the pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    pub corpus_path: PathBuf,
    pub caller_path: PathBuf,
    pub evaluator_path: PathBuf,
    /// Initial model-parameter configuration (iteration 0's base).
    pub config_path: PathBuf,
    pub mutation_spec_path: PathBuf,
    pub output_path: PathBuf,
    pub mode: RunMode,
    /// Number of best candidates folded into the next configuration.
    pub top_k: usize,
    pub iterations: usize,
    pub retry_max: u32,
    /// Tune on the leading `ceil(fraction * n)` corpus samples.
    pub cross_validation: Option<f64>,
}

impl RunSettings {
    /// Abort before any task submission when an input is missing or a
    /// bound is nonsensical.
    pub fn validate(&self) -> CtResult<()> {
        let required = [
            ("training corpus", &self.corpus_path),
            ("caller binary", &self.caller_path),
            ("evaluation binary", &self.evaluator_path),
            ("parameter config", &self.config_path),
            ("mutation spec", &self.mutation_spec_path),
        ];
        for (label, path) in required {
            if !path.exists() {
                return Err(config_error!("{label} not found: {}", path.display()));
            }
        }
        if self.top_k == 0 {
            return Err(config_error!("top-k must be at least 1"));
        }
        if self.iterations == 0 {
            return Err(config_error!("iteration count must be at least 1"));
        }
        if let Some(fraction) = self.cross_validation {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(config_error!(
                    "cross-validation fraction must be in (0, 1], got {fraction}"
                ));
            }
        }
        Ok(())
    }
}

/// Per-iteration record kept in the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationOutcome {
    pub iteration: usize,
    /// Encoded keys of the candidates folded into the next configuration.
    pub selected: Vec<String>,
    pub best_score: f64,
    pub failed_tasks: usize,
}

/// Run-level summary persisted alongside the iteration directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub iterations: Vec<IterationOutcome>,
}

/// Sequences mutate/execute/aggregate/select across iterations.
pub struct Controller<'a, E: TaskExecutor> {
    settings: &'a RunSettings,
    executor: E,
    samples: Vec<SampleRecord>,
    spec: MutationSpec,
}

impl<'a, E: TaskExecutor> Controller<'a, E> {
    /// Validate settings and load the run-wide inputs (corpus, mutation
    /// spec). Fails before anything is submitted or written.
    pub fn new(settings: &'a RunSettings, executor: E) -> CtResult<Self> {
        settings.validate()?;

        let mut samples = load_manifest(&settings.corpus_path)?;
        if let Some(fraction) = settings.cross_validation {
            let keep = ((samples.len() as f64 * fraction).ceil() as usize).clamp(1, samples.len());
            info!(
                total = samples.len(),
                keep, "tuning on leading cross-validation subset"
            );
            samples.truncate(keep);
        }
        if samples.is_empty() {
            return Err(config_error!(
                "training corpus {} contains no samples",
                settings.corpus_path.display()
            ));
        }

        let spec = MutationSpec::load(&settings.mutation_spec_path)?;
        if spec.is_empty() {
            return Err(config_error!(
                "mutation spec {} names no tunable parameters",
                settings.mutation_spec_path.display()
            ));
        }

        // Mutating a key the base config does not carry is a configuration
        // authoring error; catch it before the first iteration.
        let base = ParameterConfig::load(&settings.config_path)?;
        for (name, _) in spec.entries() {
            if !base.contains(name) {
                return Err(config_error!(
                    "parameter {name} does not exist in configuration file {}",
                    settings.config_path.display()
                ));
            }
        }

        Ok(Self {
            settings,
            executor,
            samples,
            spec,
        })
    }

    pub fn samples(&self) -> &[SampleRecord] {
        &self.samples
    }

    /// Run the full tuning loop, persisting a config snapshot and summary
    /// after every iteration.
    pub fn run(&self) -> CtResult<RunSummary> {
        fs::create_dir_all(&self.settings.output_path)?;
        let plan = ResourcePlan::for_mode(self.settings.mode);
        info!(
            samples = self.samples.len(),
            parameters = self.spec.len(),
            iterations = self.settings.iterations,
            concurrency = plan.concurrency,
            task_memory_mb = plan.task_memory_mb,
            "starting tuning run"
        );

        let mut summary = RunSummary {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            iterations: Vec::new(),
        };

        for iteration in 0..self.settings.iterations {
            let outcome = self.run_iteration(iteration, &plan)?;
            summary.iterations.push(outcome);
            self.write_summary(&summary)?;
        }

        summary.finished_at = Some(Utc::now());
        self.write_summary(&summary)?;
        info!(run_id = %summary.run_id, "tuning run complete");
        Ok(summary)
    }

    fn base_config_path(&self, iteration: usize) -> PathBuf {
        if iteration == 0 {
            self.settings.config_path.clone()
        } else {
            iteration_dir(&self.settings.output_path, iteration - 1).join(CONFIG_FILE)
        }
    }

    fn run_iteration(&self, iteration: usize, plan: &ResourcePlan) -> CtResult<IterationOutcome> {
        let output = &self.settings.output_path;
        let iter_dir = iteration_dir(output, iteration);
        fs::create_dir_all(&iter_dir)?;

        let base = ParameterConfig::load(&self.base_config_path(iteration))?;
        let ctx = GraphContext {
            caller_path: self.settings.caller_path.clone(),
            evaluator_path: self.settings.evaluator_path.clone(),
            output_path: output.clone(),
            memory_mb: plan.task_memory_mb,
            retry_max: self.settings.retry_max,
        };

        // Mutate: one candidate per tunable parameter, each derived from a
        // fresh copy of the shared base config.
        let mut graph = TaskGraph::new();
        let mut candidates: Vec<Candidate> = Vec::with_capacity(self.spec.len());
        for (name, range) in self.spec.entries() {
            let candidate = mutate(&base, name, *range)?;
            let cand_dir = candidate_dir(output, iteration, &candidate.key);
            for sample in &self.samples {
                fs::create_dir_all(cand_dir.join(&sample.name))?;
            }
            candidate.config.save(&cand_dir.join(CONFIG_FILE))?;
            build_candidate_tasks(&mut graph, &ctx, iteration, &candidate, &self.samples)?;
            candidates.push(candidate);
        }

        // Execute: the single fan-in barrier per iteration.
        info!(iteration, tasks = graph.len(), "executing iteration graph");
        let report = self.executor.run_graph(&graph, plan)?;
        let failed_tasks = report.failed();
        if failed_tasks > 0 {
            warn!(
                iteration,
                failed = failed_tasks,
                "tasks failed after retries; aggregation proceeds on what completed"
            );
        }

        // Aggregate: one row per candidate, in submission order.
        let aggregate_path = iter_dir.join(RESULTS_FILE);
        for candidate in &candidates {
            let cand_dir = candidate_dir(output, iteration, &candidate.key);
            let mut per_sample = Vec::with_capacity(self.samples.len());
            for sample in &self.samples {
                let results_path = cand_dir.join(&sample.name).join(RESULTS_FILE);
                per_sample.push((
                    sample.name.clone(),
                    metrics::parse_sample_results(&results_path)?,
                ));
            }
            metrics::write_sample_table(&cand_dir.join(RESULTS_FILE), &per_sample)?;
            let row = metrics::aggregate(&candidate.key, &per_sample)?;
            metrics::append_aggregate_row(&aggregate_path, &row)?;
        }

        // Select: re-parse the aggregate file (the candidate key is the
        // identity across the process boundary) and fold the winners into
        // the previous base config.
        let rows = metrics::read_aggregate_rows(&aggregate_path)?;
        let selected = selector::select_best(&rows, self.settings.top_k);
        let best_score = rows.iter().map(|r| r.score()).fold(f64::NEG_INFINITY, f64::max);
        let next = selector::apply_selection(&base, &selected)?;
        next.save(&iter_dir.join(CONFIG_FILE))?;

        info!(
            iteration,
            best_score,
            selected = ?selected.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "iteration complete"
        );
        Ok(IterationOutcome {
            iteration,
            selected: selected.iter().map(ToString::to_string).collect(),
            best_score,
            failed_tasks,
        })
    }

    fn write_summary(&self, summary: &RunSummary) -> CtResult<()> {
        let text = serde_json::to_string_pretty(summary)?;
        fs::write(self.settings.output_path.join(SUMMARY_FILE), text)?;
        Ok(())
    }
}
