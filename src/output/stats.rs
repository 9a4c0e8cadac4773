//! Crawl session report
//!
//! This module collects the per-session counters kept by the coordinator and
//! renders them for the command line.

use crate::state::SkipReason;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Summary of one crawl session
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// When the session started
    pub started_at: DateTime<Utc>,

    /// When the session finished (None while running)
    pub finished_at: Option<DateTime<Utc>>,

    /// SHA-256 of the configuration file, when one was loaded
    pub config_hash: Option<String>,

    /// Tasks handed to a worker
    pub pages_dispatched: u64,

    /// Pages whose fetch returned a body
    pub pages_fetched: u64,

    /// Pages whose record was accepted into the result set
    pub pages_accepted: u64,

    /// Pages rejected because their content was already accepted
    pub pages_duplicate: u64,

    /// Pages that contributed nothing, for any reason
    pub pages_skipped: u64,

    /// Pages whose static fetch was replaced by a rendered one
    pub pages_rendered: u64,

    /// Snapshot writes that failed after every retry
    pub persist_failures: u64,

    /// Count of skipped pages per reason
    pub skip_reasons: BTreeMap<SkipReason, u64>,

    /// Why the session stopped early, if it did
    pub aborted: Option<String>,

    /// Keywords in effect when the session ended
    pub final_keywords: Vec<String>,
}

impl CrawlReport {
    /// Starts a report stamped with the current time
    pub fn start(config_hash: Option<String>) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            config_hash,
            pages_dispatched: 0,
            pages_fetched: 0,
            pages_accepted: 0,
            pages_duplicate: 0,
            pages_skipped: 0,
            pages_rendered: 0,
            persist_failures: 0,
            skip_reasons: BTreeMap::new(),
            aborted: None,
            final_keywords: Vec::new(),
        }
    }

    /// Counts a skipped page under its reason
    pub fn record_skip(&mut self, reason: SkipReason) {
        self.pages_skipped += 1;
        if reason == SkipReason::Duplicate {
            self.pages_duplicate += 1;
        }
        *self.skip_reasons.entry(reason).or_insert(0) += 1;
    }

    /// Marks the report finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration of the session in seconds
    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    /// Returns true if the session stopped before the frontier drained
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

/// Prints the report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Session:");
    println!("  Started: {}", report.started_at.to_rfc3339());
    if let Some(finished) = report.finished_at {
        println!("  Finished: {}", finished.to_rfc3339());
    }
    if let Some(seconds) = report.duration_seconds() {
        println!("  Duration: {}s", seconds);
    }
    if let Some(hash) = &report.config_hash {
        println!("  Config hash: {}", hash);
    }
    println!();

    println!("Pages:");
    println!("  Dispatched: {}", report.pages_dispatched);
    println!("  Fetched: {}", report.pages_fetched);
    println!("  Rendered: {}", report.pages_rendered);
    println!("  Accepted: {}", report.pages_accepted);
    println!("  Duplicates: {}", report.pages_duplicate);
    println!("  Skipped: {}", report.pages_skipped);
    println!();

    if !report.skip_reasons.is_empty() {
        println!("Skip Reasons:");
        let mut reasons: Vec<_> = report.skip_reasons.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1));

        for (reason, count) in reasons {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if report.persist_failures > 0 {
        println!("Persistence failures: {}", report.persist_failures);
        println!();
    }

    if !report.final_keywords.is_empty() {
        println!("Keywords: {}", report.final_keywords.join(", "));
        println!();
    }

    let acceptance_rate = if report.pages_dispatched > 0 {
        (report.pages_accepted as f64 / report.pages_dispatched as f64) * 100.0
    } else {
        0.0
    };

    match &report.aborted {
        Some(reason) => println!("Aborted: {}", reason),
        None => println!(
            "Acceptance Rate: {:.1}% ({} / {} pages accepted)",
            acceptance_rate, report.pages_accepted, report.pages_dispatched
        ),
    }
}
