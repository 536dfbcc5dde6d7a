//! Builds the per-iteration compute/evaluation DAG.
//!
//! Directory scheme: `Iteration_<i>/Parameter_<name>_<value>/<sample>/`,
//! holding one caller output and one `Results.txt` per (candidate, sample)
//! pair. Sibling pairs never share an output directory, so the whole
//! fan-out is safe to run concurrently.

use std::path::{Path, PathBuf};

use ct_types::{Candidate, CandidateKey, CtResult, SampleRecord};

use crate::task::{RetryMode, Task, TaskGraph};

/// Caller output artifact inside a sample directory.
pub const CALLER_OUTPUT: &str = "CNV.vcf.gz";
/// Evaluation output (per sample) and aggregate output (per iteration).
pub const RESULTS_FILE: &str = "Results.txt";
/// Serialized model-parameter configuration.
pub const CONFIG_FILE: &str = "ModelParameters.json";

/// Paths and budgets that stay fixed across an iteration's graph.
#[derive(Debug, Clone)]
pub struct GraphContext {
    pub caller_path: PathBuf,
    pub evaluator_path: PathBuf,
    pub output_path: PathBuf,
    pub memory_mb: u64,
    pub retry_max: u32,
}

pub fn iteration_dir(output: &Path, iteration: usize) -> PathBuf {
    output.join(format!("Iteration_{iteration}"))
}

pub fn candidate_dir(output: &Path, iteration: usize, key: &CandidateKey) -> PathBuf {
    iteration_dir(output, iteration).join(format!("Parameter_{key}"))
}

/// Append one candidate's compute + evaluation fan-out to `graph`.
///
/// Per sample: a caller task reading the candidate's serialized
/// configuration, and an evaluation task depending on it that scores the
/// caller output against the sample's truth file.
pub fn build_candidate_tasks(
    graph: &mut TaskGraph,
    ctx: &GraphContext,
    iteration: usize,
    candidate: &Candidate,
    samples: &[SampleRecord],
) -> CtResult<()> {
    let cand_dir = candidate_dir(&ctx.output_path, iteration, &candidate.key);
    let config_path = cand_dir.join(CONFIG_FILE);

    for sample in samples {
        let sample_dir = cand_dir.join(&sample.name);
        let caller_output = sample_dir.join(CALLER_OUTPUT);
        let results_path = sample_dir.join(RESULTS_FILE);

        let caller_id = format!("caller_{}_{}", candidate.key, sample.name);
        let caller_command = vec![
            ctx.caller_path.display().to_string(),
            "-v".to_string(),
            sample
                .data_path
                .join("VFResultsTumor.txt.gz")
                .display()
                .to_string(),
            "-i".to_string(),
            sample
                .data_path
                .join("Tumor.partitioned")
                .display()
                .to_string(),
            "-o".to_string(),
            caller_output.display().to_string(),
            "-b".to_string(),
            sample.filter_bed.display().to_string(),
            "-n".to_string(),
            "Tumor".to_string(),
            "-r".to_string(),
            sample.reference_genome.display().to_string(),
            "-c".to_string(),
            config_path.display().to_string(),
            "-t".to_string(),
            sample.truth_file.display().to_string(),
        ];
        graph.submit(Task {
            id: caller_id.clone(),
            command: caller_command,
            memory_mb: ctx.memory_mb,
            retry_max: ctx.retry_max,
            retry_mode: RetryMode::All,
            dependencies: Vec::new(),
        })?;

        let evaluate_command = vec![
            ctx.evaluator_path.display().to_string(),
            sample.truth_file.display().to_string(),
            caller_output.display().to_string(),
            sample.exclude_regions.display().to_string(),
            results_path.display().to_string(),
        ];
        graph.submit(Task {
            id: format!("evaluate_{}_{}", candidate.key, sample.name),
            command: evaluate_command,
            memory_mb: ctx.memory_mb,
            retry_max: ctx.retry_max,
            retry_mode: RetryMode::All,
            dependencies: vec![caller_id],
        })?;
    }
    Ok(())
}
