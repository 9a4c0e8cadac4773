//! Output module for result snapshots and crawl reports
//!
//! This module handles:
//! - Writing the hierarchical JSON snapshot
//! - Writing the flattened (URL, Heading, Content) export as CSV or SQLite
//! - Retrying failed snapshot writes
//! - Recording and printing the session report

mod csv_output;
mod json;
mod persister;
mod sqlite_output;
pub mod stats;
mod traits;

pub use csv_output::CsvSink;
pub use json::JsonSink;
pub use persister::Persister;
pub use sqlite_output::SqliteSink;
pub use stats::{print_report, CrawlReport};
pub use traits::{PersistError, PersistResult, RecordSink};

pub use crate::state::ResultSet;
