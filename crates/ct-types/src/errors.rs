use thiserror::Error;

/// Main error type for the CopyTune system
#[derive(Error, Debug)]
pub enum CtError {
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Training-corpus errors
#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: String },

    #[error("Manifest has no header line: {path}")]
    MissingHeader { path: String },

    #[error("Manifest column not found: {column}")]
    ColumnNotFound { column: String },

    #[error("Manifest read failed: {message}")]
    ReadFailed { message: String },
}

/// Task-graph errors
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate task id: {id}")]
    DuplicateTask { id: String },

    #[error("Task {id} depends on unknown task {dependency}")]
    UnknownDependency { id: String, dependency: String },

    #[error("Dependency cycle involving task {id}")]
    Cycle { id: String },

    #[error("Executor failure: {message}")]
    ExecutorFailed { message: String },
}

/// Metric parsing and aggregation errors
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Results file not found: {path}")]
    ResultsNotFound { path: String },

    #[error("Malformed aggregate row: {line}")]
    MalformedRow { line: String },

    #[error("Candidate key does not decode: {key}")]
    BadCandidateKey { key: String },

    #[error("No parseable values for metric {metric} of candidate {candidate}")]
    NoValues { metric: String, candidate: String },
}

/// Result type alias for CopyTune operations
pub type CtResult<T> = Result<T, CtError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::CtError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MetricsError::NoValues {
            metric: "Accuracy".to_string(),
            candidate: "D_1.5".to_string(),
        };

        assert!(error.to_string().contains("Accuracy"));
        assert!(error.to_string().contains("D_1.5"));
    }

    #[test]
    fn test_error_conversion() {
        let corpus_error = CorpusError::ColumnNotFound {
            column: "truthFile".to_string(),
        };
        let ct_error: CtError = corpus_error.into();

        match ct_error {
            CtError::Corpus(_) => (),
            _ => panic!("Expected Corpus error"),
        }
    }

    #[test]
    fn test_config_error_macro() {
        let err = config_error!("parameter {} does not exist", "D");
        assert!(err.to_string().contains("parameter D does not exist"));
    }
}
