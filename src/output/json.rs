//! Hierarchical JSON output: `{url: {heading: [section, ...]}}`

use crate::output::traits::{PersistError, PersistResult, RecordSink};
use crate::state::ResultSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes the result set as pretty-printed JSON
pub struct JsonSink {
    path: PathBuf,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonSink {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write_snapshot(&self, results: &ResultSet) -> PersistResult<()> {
        let mut body = serde_json::to_vec_pretty(results)?;
        body.push(b'\n');
        write_atomically(&self.path, &body)
    }
}

/// Writes to a sibling temp file, then renames over the target
///
/// Readers never observe a half-written snapshot.
pub(crate) fn write_atomically(path: &Path, body: &[u8]) -> PersistResult<()> {
    ensure_parent(path)?;
    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp).map_err(|e| PersistError::io(&tmp, e))?;
    file.write_all(body)
        .and_then(|_| file.sync_all())
        .map_err(|e| PersistError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| PersistError::io(path, e))
}

pub(crate) fn ensure_parent(path: &Path) -> PersistResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))
        }
        _ => Ok(()),
    }
}

pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
