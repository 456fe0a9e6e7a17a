//! Pipeline-level failures.
//!
//! Every variant is fatal: a stage that hits one aborts without writing partial
//! output. Only transient provider errors are retried, and that happens below
//! this level (see `data::retry`).

use std::path::PathBuf;
use thiserror::Error;

use crate::data::provider::DataError;
use crate::domain::SeriesError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data unavailable for {symbols:?} after {attempts} attempt(s): {reason}")]
    DataUnavailable {
        symbols: Vec<String>,
        attempts: u32,
        reason: String,
    },

    #[error("{file} missing columns: {missing:?}. Present: {present:?}")]
    SchemaViolation {
        file: String,
        missing: Vec<String>,
        present: Vec<String>,
    },

    #[error("{column} still has {missing_rows} missing value(s) after forward-fill; check the input date ranges")]
    UnresolvableGap { column: String, missing_rows: usize },

    #[error("{path}: row {row}: {reason}")]
    InvalidRow {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    #[error("no input file found; tried {tried:?}")]
    InputNotFound { tried: Vec<PathBuf> },

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("csv error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }
}
