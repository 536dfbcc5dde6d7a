//! Training-corpus manifest parsing.
//!
//! The manifest is tab-delimited. Its first line is a `#`-prefixed header
//! whose stripped field names key the columns, so column order in the file
//! is free. Rows with fewer than six columns, or whose first cell starts
//! with `#`, are skipped. Every path field is resolved against the
//! manifest's directory; the truth file is additionally resolved under the
//! sample's data path.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info, warn};

use ct_types::{CorpusError, CtResult, SampleRecord};

// `exlcudeRegions` is the historical header spelling; manifests in the
// wild carry it, so we keep matching it.
const COL_NAME: &str = "sampleNames";
const COL_DATA: &str = "sampleDataPath";
const COL_REFERENCE: &str = "sampleReferenceGenome";
const COL_FILTER_BED: &str = "sampleFilterBed";
const COL_TRUTH: &str = "truthFile";
const COL_EXCLUDE: &str = "exlcudeRegions";

const MIN_COLUMNS: usize = 6;

/// Load the training corpus manifest into sample records.
pub fn load_manifest(path: &Path) -> CtResult<Vec<SampleRecord>> {
    let file = File::open(path).map_err(|_| CorpusError::ManifestNotFound {
        path: path.display().to_string(),
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

    let mut lines = BufReader::new(file).lines();
    let header_line = lines
        .next()
        .ok_or_else(|| CorpusError::MissingHeader {
            path: path.display().to_string(),
        })?
        .map_err(|e| CorpusError::ReadFailed {
            message: e.to_string(),
        })?;
    let headers: Vec<&str> = header_line
        .trim_start_matches('#')
        .trim_end()
        .split('\t')
        .collect();

    let column = |name: &str| -> Result<usize, CorpusError> {
        headers
            .iter()
            .position(|h| *h == name)
            .ok_or_else(|| CorpusError::ColumnNotFound {
                column: name.to_string(),
            })
    };
    let name_idx = column(COL_NAME)?;
    let data_idx = column(COL_DATA)?;
    let reference_idx = column(COL_REFERENCE)?;
    let filter_idx = column(COL_FILTER_BED)?;
    let truth_idx = column(COL_TRUTH)?;
    let exclude_idx = column(COL_EXCLUDE)?;
    let max_idx = [
        name_idx,
        data_idx,
        reference_idx,
        filter_idx,
        truth_idx,
        exclude_idx,
    ]
    .into_iter()
    .max()
    .unwrap_or(0);

    let mut samples = Vec::new();
    for (line_number, line) in lines.enumerate() {
        let line = line.map_err(|e| CorpusError::ReadFailed {
            message: e.to_string(),
        })?;
        let columns: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
        if columns.len() < MIN_COLUMNS {
            debug!(line = line_number + 2, "skipping short manifest row");
            continue;
        }
        if columns[0].starts_with('#') {
            continue;
        }
        if columns.len() <= max_idx {
            warn!(
                line = line_number + 2,
                "manifest row shorter than header; skipping"
            );
            continue;
        }

        let data_path = base_dir.join(columns[data_idx]);
        let truth_file = data_path.join(columns[truth_idx]);
        samples.push(SampleRecord {
            name: columns[name_idx].to_string(),
            reference_genome: base_dir.join(columns[reference_idx]),
            filter_bed: base_dir.join(columns[filter_idx]),
            exclude_regions: base_dir.join(columns[exclude_idx]),
            data_path,
            truth_file,
        });
    }

    info!(
        samples = samples.len(),
        manifest = %path.display(),
        "loaded training corpus"
    );
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_manifest(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("corpus.txt");
        let mut file = File::create(&path).unwrap();
        write!(file, "{body}").unwrap();
        path
    }

    #[test]
    fn loads_rows_and_resolves_paths() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(
            &dir,
            "#sampleNames\tsampleDataPath\tsampleReferenceGenome\tsampleFilterBed\ttruthFile\texlcudeRegions\n\
             HCC2218\tHCC2218\tgenome.fa\tfilter.bed\ttruth.txt\texclude.bed\n\
             # commented out row\t-\t-\t-\t-\t-\n\
             HCC1187\tHCC1187\tgenome.fa\tfilter.bed\ttruth.txt\texclude.bed\n\
             COLO829\tCOLO829\tgenome.fa\tfilter.bed\ttruth.txt\texclude.bed\n",
        );

        let samples = load_manifest(&manifest).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].name, "HCC2218");
        assert_eq!(samples[0].data_path, dir.path().join("HCC2218"));
        assert_eq!(samples[0].reference_genome, dir.path().join("genome.fa"));
        assert_eq!(
            samples[0].truth_file,
            dir.path().join("HCC2218").join("truth.txt")
        );
        assert_eq!(samples[2].name, "COLO829");
    }

    #[test]
    fn skips_short_rows() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(
            &dir,
            "#sampleNames\tsampleDataPath\tsampleReferenceGenome\tsampleFilterBed\ttruthFile\texlcudeRegions\n\
             short\trow\n\
             \n\
             HCC2218\tHCC2218\tgenome.fa\tfilter.bed\ttruth.txt\texclude.bed\n",
        );

        let samples = load_manifest(&manifest).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "HCC2218");
    }

    #[test]
    fn header_order_is_free() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(
            &dir,
            "#truthFile\tsampleNames\tsampleDataPath\tsampleReferenceGenome\tsampleFilterBed\texlcudeRegions\n\
             truth.txt\tHCC2218\tHCC2218\tgenome.fa\tfilter.bed\texclude.bed\n",
        );

        let samples = load_manifest(&manifest).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(
            samples[0].truth_file,
            dir.path().join("HCC2218").join("truth.txt")
        );
    }

    #[test]
    fn missing_manifest_is_a_corpus_error() {
        let err = load_manifest(Path::new("/no/such/corpus.txt")).unwrap_err();
        match err {
            ct_types::CtError::Corpus(CorpusError::ManifestNotFound { .. }) => (),
            other => panic!("expected ManifestNotFound, got: {other:?}"),
        }
    }

    #[test]
    fn missing_column_is_a_corpus_error() {
        let dir = TempDir::new().unwrap();
        let manifest = write_manifest(
            &dir,
            "#sampleNames\tsampleDataPath\n\
             HCC2218\tHCC2218\n",
        );
        let err = load_manifest(&manifest).unwrap_err();
        match err {
            ct_types::CtError::Corpus(CorpusError::ColumnNotFound { column }) => {
                assert_eq!(column, "sampleReferenceGenome");
            }
            other => panic!("expected ColumnNotFound, got: {other:?}"),
        }
    }
}
