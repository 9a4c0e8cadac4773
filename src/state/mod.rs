//! State module for tracking crawl progress
//!
//! This module provides the session data model.
//!
//! # Components
//!
//! - `TaskState`: lifecycle of a single crawl task
//! - `CrawlTask`: a URL admitted to the frontier with its remaining depth
//! - `VisitedSet`: URLs already dispatched, shared with workers
//! - `ResultSet`: accepted records in acceptance order
//! - `CrawlState`: the session aggregate owned by the coordinator

mod crawl_state;
mod task_state;

pub use crawl_state::{CrawlState, CrawlTask, ResultSet, VisitedSet};
pub use task_state::{SkipReason, TaskState};
