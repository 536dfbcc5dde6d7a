//! Evaluation-output parsing and per-candidate aggregation.
//!
//! Each evaluation task writes a `key<TAB>value` `Results.txt`; this module
//! extracts the four scored metrics per sample, writes the per-candidate
//! sample table, and reduces the samples to one median/mean aggregate row
//! per candidate. A metric the evaluator did not emit is an explicit
//! missing value: it appears as `N/A` in the sample table but is excluded
//! from the aggregate statistics.

use std::fs;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::warn;

use ct_types::{CandidateKey, CtResult, MetricsError};

/// Missing-value sentinel used in the per-candidate sample table.
pub const MISSING: &str = "N/A";

const AGGREGATE_FIELDS: usize = 9;

/// Per-sample evaluation metrics; `None` marks a missing or unparseable
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SampleResult {
    pub accuracy: Option<f64>,
    pub direction_accuracy: Option<f64>,
    pub recall: Option<f64>,
    pub precision: Option<f64>,
}

/// Parse one sample's `Results.txt`.
///
/// A missing file is an error: the upstream task was expected to produce
/// it, so the iteration cannot be scored.
pub fn parse_sample_results(path: &Path) -> CtResult<SampleResult> {
    let text = fs::read_to_string(path).map_err(|_| MetricsError::ResultsNotFound {
        path: path.display().to_string(),
    })?;

    let mut result = SampleResult::default();
    for line in text.lines() {
        let mut fields = line.trim().split('\t');
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let parsed = value.trim().parse::<f64>().ok();
        match key {
            "Accuracy" => result.accuracy = parsed,
            "DirectionAccuracy" => result.direction_accuracy = parsed,
            "Recall" => result.recall = parsed,
            "Precision" => result.precision = parsed,
            _ => {}
        }
    }
    Ok(result)
}

/// Write the per-candidate sample table: one row per sample with the four
/// metric columns, `N/A` where a value is missing.
pub fn write_sample_table(path: &Path, samples: &[(String, SampleResult)]) -> CtResult<()> {
    let mut out = String::new();
    for (name, result) in samples {
        out.push_str(&format!(
            "{name}\t{}\t{}\t{}\t{}\n",
            fmt_value(result.accuracy),
            fmt_value(result.direction_accuracy),
            fmt_value(result.recall),
            fmt_value(result.precision),
        ));
    }
    fs::write(path, out)?;
    Ok(())
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

/// One aggregate line per candidate: median and mean of each metric across
/// all samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub key: CandidateKey,
    pub median_accuracy: f64,
    pub mean_accuracy: f64,
    pub median_direction_accuracy: f64,
    pub mean_direction_accuracy: f64,
    pub median_recall: f64,
    pub mean_recall: f64,
    pub median_precision: f64,
    pub mean_precision: f64,
}

impl AggregateRow {
    /// Ranking score used by the selector.
    pub fn score(&self) -> f64 {
        (self.median_accuracy + self.mean_accuracy) / 2.0
    }

    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.key,
            self.median_accuracy,
            self.mean_accuracy,
            self.median_direction_accuracy,
            self.mean_direction_accuracy,
            self.median_recall,
            self.mean_recall,
            self.median_precision,
            self.mean_precision,
        )
    }

    pub fn parse_line(line: &str) -> CtResult<Self> {
        let fields: Vec<&str> = line.trim_end().split('\t').collect();
        if fields.len() != AGGREGATE_FIELDS {
            return Err(MetricsError::MalformedRow {
                line: line.to_string(),
            }
            .into());
        }
        let key = CandidateKey::decode(fields[0])?;
        let mut numbers = [0.0f64; AGGREGATE_FIELDS - 1];
        for (slot, field) in numbers.iter_mut().zip(&fields[1..]) {
            *slot = field.parse::<f64>().map_err(|_| MetricsError::MalformedRow {
                line: line.to_string(),
            })?;
        }
        Ok(Self {
            key,
            median_accuracy: numbers[0],
            mean_accuracy: numbers[1],
            median_direction_accuracy: numbers[2],
            mean_direction_accuracy: numbers[3],
            median_recall: numbers[4],
            mean_recall: numbers[5],
            median_precision: numbers[6],
            mean_precision: numbers[7],
        })
    }
}

/// Aggregate one candidate's sample results into a single row.
///
/// Missing values are excluded from the statistics with a warning; a
/// metric with no parseable value across the whole corpus is an error.
pub fn aggregate(key: &CandidateKey, samples: &[(String, SampleResult)]) -> CtResult<AggregateRow> {
    let accuracy = collect(key, "Accuracy", samples, |r| r.accuracy)?;
    let direction = collect(key, "DirectionAccuracy", samples, |r| r.direction_accuracy)?;
    let recall = collect(key, "Recall", samples, |r| r.recall)?;
    let precision = collect(key, "Precision", samples, |r| r.precision)?;

    Ok(AggregateRow {
        key: key.clone(),
        median_accuracy: median(&accuracy),
        mean_accuracy: mean(&accuracy),
        median_direction_accuracy: median(&direction),
        mean_direction_accuracy: mean(&direction),
        median_recall: median(&recall),
        mean_recall: mean(&recall),
        median_precision: median(&precision),
        mean_precision: mean(&precision),
    })
}

fn collect(
    key: &CandidateKey,
    metric: &str,
    samples: &[(String, SampleResult)],
    field: impl Fn(&SampleResult) -> Option<f64>,
) -> CtResult<Vec<f64>> {
    let values: Vec<f64> = samples.iter().filter_map(|(_, r)| field(r)).collect();
    if values.len() < samples.len() {
        warn!(
            candidate = %key,
            metric,
            missing = samples.len() - values.len(),
            "metric missing for some samples; aggregating over the rest"
        );
    }
    if values.is_empty() {
        return Err(MetricsError::NoValues {
            metric: metric.to_string(),
            candidate: key.to_string(),
        }
        .into());
    }
    Ok(values)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Append one aggregate row to the iteration's results file.
pub fn append_aggregate_row(path: &Path, row: &AggregateRow) -> CtResult<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", row.to_line())?;
    Ok(())
}

/// Parse the per-iteration aggregate file back into rows, in submission
/// order.
pub fn read_aggregate_rows(path: &Path) -> CtResult<Vec<AggregateRow>> {
    let text = fs::read_to_string(path).map_err(|_| MetricsError::ResultsNotFound {
        path: path.display().to_string(),
    })?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(AggregateRow::parse_line)
        .collect()
}
