//! Error types for every stage of a run.
//!
//! Load errors (lexicon, grid, record source) are raised before any work is
//! partitioned. Per-line record problems never show up here; they are absorbed
//! during ingestion and only counted.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while building a [`crate::Lexicon`]. All of them abort the run.
#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("failed to read lexicon {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line that does not parse into `(key, integer weight)`.
    #[error("malformed lexicon entry on line {line}: {reason} ({content:?})")]
    MalformedEntry {
        line: usize,
        content: String,
        reason: &'static str,
    },

    /// Keys must be unique across words and phrases.
    #[error("duplicate lexicon key '{key}' on line {line}")]
    DuplicateEntry { line: usize, key: String },

    #[error("could not compile matcher for phrase '{phrase}': {source}")]
    Pattern {
        phrase: String,
        #[source]
        source: regex::Error,
    },
}

/// Failures while building a [`crate::SpatialIndex`].
#[derive(Debug, Error)]
pub enum GridError {
    #[error("failed to read grid {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("grid document is not valid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cell id '{id}' appears more than once")]
    DuplicateCell { id: String },
}

/// Fatal failures of the record source as a whole. Bad individual rows are
/// skipped, not reported here.
#[derive(Debug, Error)]
pub enum RecordSourceError {
    #[error("failed to read records {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("record stream could not be read: {0}")]
    Stream(#[source] io::Error),

    #[error("record document is not valid: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Failures of the distributed scoring stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A worker panicked or never delivered its partial result.
    #[error("worker {worker} failed: {reason}")]
    WorkerFailure { worker: usize, reason: String },
}

/// Top-level error of a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Lexicon(#[from] LexiconError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Records(#[from] RecordSourceError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("failed to write report: {0}")]
    Report(#[source] io::Error),
}

impl Error {
    /// Process exit status for this failure. `2` is left to clap for usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Lexicon(_) | Error::Grid(_) | Error::Records(_) => 1,
            Error::Pipeline(_) => 3,
            Error::Report(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_separate_load_pipeline_and_report_failures() {
        let load = Error::from(LexiconError::DuplicateEntry {
            line: 2,
            key: "good".into(),
        });
        let worker = Error::from(PipelineError::WorkerFailure {
            worker: 4,
            reason: "panicked".into(),
        });
        let report = Error::Report(io::Error::other("disk full"));

        assert_eq!(load.exit_code(), 1);
        assert_eq!(worker.exit_code(), 3);
        assert_eq!(report.exit_code(), 4);
        assert_eq!(worker.to_string(), "worker 4 failed: panicked");
    }
}
