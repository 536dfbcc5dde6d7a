//! `copytune` — iterative parameter tuning for a somatic CNV caller.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ct_graph::{LocalExecutor, RunMode};
use ct_tuner::{Controller, RunSettings};
use ct_tuner::controller::{DEFAULT_ITERATIONS, DEFAULT_RETRY_MAX};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Run tasks as local child processes across a worker pool.
    Local,
    /// Size tasks for a cluster scheduler that owns placement.
    Distributed,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Local => RunMode::Local,
            ModeArg::Distributed => RunMode::Distributed,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "copytune", version, about = "Iterative CNV-caller model-parameter tuner")]
struct Cli {
    /// Tab-separated training-corpus manifest.
    #[arg(long)]
    corpus: PathBuf,

    /// CNV caller binary invoked once per (candidate, sample).
    #[arg(long)]
    caller: PathBuf,

    /// Evaluation binary scoring caller output against truth.
    #[arg(long)]
    evaluator: PathBuf,

    /// Initial model-parameter configuration (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Parameter-name to [min, max] mutation ranges (JSON).
    #[arg(long)]
    mutation_spec: PathBuf,

    /// Output directory; one Iteration_<i> subdirectory per iteration.
    #[arg(long)]
    output: PathBuf,

    #[arg(long, value_enum, default_value_t = ModeArg::Local)]
    mode: ModeArg,

    /// Number of best candidates folded into the next configuration.
    #[arg(long, default_value_t = 1)]
    top_k: usize,

    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,

    /// Retries per task after its first failed attempt.
    #[arg(long, default_value_t = DEFAULT_RETRY_MAX)]
    retry_max: u32,

    /// Tune on the leading ceil(fraction * n) corpus samples.
    #[arg(long)]
    cross_validation: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = RunSettings {
        corpus_path: cli.corpus,
        caller_path: cli.caller,
        evaluator_path: cli.evaluator,
        config_path: cli.config,
        mutation_spec_path: cli.mutation_spec,
        output_path: cli.output,
        mode: cli.mode.into(),
        top_k: cli.top_k,
        iterations: cli.iterations,
        retry_max: cli.retry_max,
        cross_validation: cli.cross_validation,
    };

    let controller = Controller::new(&settings, LocalExecutor)?;
    let summary = controller.run()?;
    println!(
        "run {} complete: {} iterations under {}",
        summary.run_id,
        summary.iterations.len(),
        settings.output_path.display()
    );
    Ok(())
}
