//! Output sink traits and error types
//!
//! This module defines the trait interface every snapshot encoder implements
//! and the errors they report.

use crate::state::ResultSet;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while writing a snapshot
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl PersistError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Result type for output operations
pub type PersistResult<T> = Result<T, PersistError>;

/// A destination for result snapshots
///
/// Every call receives the entire current result set and replaces whatever
/// the previous call wrote. Implementations must be safe to call repeatedly.
pub trait RecordSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Overwrites the destination with `results`
    fn write_snapshot(&self, results: &ResultSet) -> PersistResult<()>;
}
