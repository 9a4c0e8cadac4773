//! SQLite tabular output
//!
//! Each snapshot replaces the contents of one `records(url, heading, content)`
//! table inside a single transaction.

use crate::output::json::ensure_parent;
use crate::output::traits::{PersistResult, RecordSink};
use crate::state::ResultSet;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQL schema for the export database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    heading TEXT NOT NULL,
    content TEXT NOT NULL,
    UNIQUE(url, heading)
);

CREATE INDEX IF NOT EXISTS idx_records_url ON records(url);
"#;

/// Writes the flattened result set into a SQLite database
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> PersistResult<Connection> {
        ensure_parent(&self.path)?;
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(conn)
    }
}

impl RecordSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn write_snapshot(&self, results: &ResultSet) -> PersistResult<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM records", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO records (url, heading, content) VALUES (?1, ?2, ?3)")?;
            for (url, heading, content) in results.rows() {
                stmt.execute(params![url, heading, content])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
