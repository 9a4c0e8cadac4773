//! Incremental snapshot persistence with retry
//!
//! The persister is invoked after every accepted page and writes the whole
//! result set to each configured sink. A failing sink is retried with
//! doubling backoff; a sink that still fails is reported to the caller, who
//! logs it and carries on crawling.

use crate::config::{OutputConfig, TabularFormat};
use crate::output::csv_output::CsvSink;
use crate::output::json::JsonSink;
use crate::output::sqlite_output::SqliteSink;
use crate::output::traits::{PersistError, RecordSink};
use crate::state::ResultSet;
use std::time::Duration;

/// Writes snapshots to the hierarchical and tabular sinks
pub struct Persister {
    sinks: Vec<Box<dyn RecordSink>>,
    retries: u32,
    backoff: Duration,
}

impl Persister {
    /// Builds the JSON sink plus the configured tabular sink
    pub fn from_config(config: &OutputConfig) -> Self {
        let tabular: Box<dyn RecordSink> = match config.tabular_format {
            TabularFormat::Csv => Box::new(CsvSink::new(&config.tabular_path)),
            TabularFormat::Sqlite => Box::new(SqliteSink::new(&config.tabular_path)),
        };
        Self::new(
            vec![Box::new(JsonSink::new(&config.json_path)), tabular],
            config.persist_retries,
            Duration::from_millis(config.persist_backoff_ms),
        )
    }

    pub fn new(sinks: Vec<Box<dyn RecordSink>>, retries: u32, backoff: Duration) -> Self {
        Self {
            sinks,
            retries,
            backoff,
        }
    }

    /// Writes a snapshot to every sink
    ///
    /// Sinks are independent: one failing does not stop the others from
    /// being written.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every sink holds the snapshot
    /// * `Err(errors)` - The final error of each sink that exhausted its retries
    pub async fn persist(&self, results: &ResultSet) -> Result<(), Vec<PersistError>> {
        let mut failures = Vec::new();

        for sink in &self.sinks {
            if let Err(e) = self.persist_to(sink.as_ref(), results).await {
                tracing::error!(
                    sink = sink.name(),
                    "Snapshot write failed after {} attempts: {}",
                    self.retries + 1,
                    e
                );
                failures.push(e);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    async fn persist_to(&self, sink: &dyn RecordSink, results: &ResultSet) -> Result<(), PersistError> {
        let mut delay = self.backoff;
        let mut attempt = 0;

        loop {
            match sink.write_snapshot(results) {
                Ok(()) => {
                    tracing::trace!(sink = sink.name(), pages = results.len(), "Snapshot written");
                    return Ok(());
                }
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        sink = sink.name(),
                        attempt,
                        "Snapshot write failed, retrying in {:?}: {}",
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
