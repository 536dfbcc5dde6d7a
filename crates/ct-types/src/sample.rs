//! Training-corpus sample records.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One training sample, created once by the corpus loader and immutable for
/// the whole run. All paths are already resolved against the manifest
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub name: String,
    /// Directory holding the caller inputs for this sample.
    pub data_path: PathBuf,
    pub reference_genome: PathBuf,
    pub filter_bed: PathBuf,
    /// Ground truth used by the evaluation tool; lives inside `data_path`.
    pub truth_file: PathBuf,
    pub exclude_regions: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_record_serializes() {
        let record = SampleRecord {
            name: "HCC2218".to_string(),
            data_path: "/corpus/HCC2218".into(),
            reference_genome: "/corpus/genome.fa".into(),
            filter_bed: "/corpus/filter.bed".into(),
            truth_file: "/corpus/HCC2218/truth.txt".into(),
            exclude_regions: "/corpus/exclude.bed".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: SampleRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
