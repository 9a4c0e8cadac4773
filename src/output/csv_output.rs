//! Flattened CSV output: one `URL,Heading,Content` row per heading

use crate::output::json::{ensure_parent, temp_path};
use crate::output::traits::{PersistError, PersistResult, RecordSink};
use crate::state::ResultSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes the result set as CSV with sections joined by single spaces
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write_snapshot(&self, results: &ResultSet) -> PersistResult<()> {
        ensure_parent(&self.path)?;
        let tmp = temp_path(&self.path);

        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(["URL", "Heading", "Content"])?;
        for (url, heading, content) in results.rows() {
            writer.write_record([url, heading, content.as_str()])?;
        }
        writer.flush().map_err(|e| PersistError::io(&tmp, e))?;
        drop(writer);

        fs::rename(&tmp, &self.path).map_err(|e| PersistError::io(&self.path, e))
    }
}
