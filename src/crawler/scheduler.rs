//! Scheduler for the crawl frontier
//!
//! This module handles:
//! - Priority queue management for admitted crawl tasks
//! - Ordering shallow pages before deep ones
//! - Preserving link-score order among siblings via discovery sequence

use crate::state::CrawlTask;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A crawl task queued for dispatch with ordering information
#[derive(Debug, Clone)]
pub struct QueuedTask {
    /// The task to dispatch
    pub task: CrawlTask,

    /// Admission sequence number (lower was admitted earlier)
    pub sequence: u64,
}

// Implement ordering traits for priority queue
// Higher remaining depth pops first, then lower sequence numbers
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .depth
            .cmp(&other.task.depth)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Eq for QueuedTask {}

/// Scheduler holds the frontier of admitted but undispatched tasks
///
/// Concurrency is capped by the coordinator's worker pool; the scheduler only
/// decides which task goes next.
#[derive(Debug, Default)]
pub struct Scheduler {
    /// Frontier priority queue
    frontier: BinaryHeap<QueuedTask>,

    /// Next sequence number to hand out
    next_sequence: u64,
}

impl Scheduler {
    /// Creates an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a task to the frontier
    ///
    /// Tasks pushed in order at the same depth are popped in that order, so
    /// callers push children in link-score order.
    ///
    /// # Arguments
    ///
    /// * `task` - The admitted task
    pub fn push(&mut self, task: CrawlTask) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.frontier.push(QueuedTask { task, sequence });
    }

    /// Takes the next task to dispatch
    ///
    /// # Returns
    ///
    /// * `Some(CrawlTask)` - The shallowest, earliest-admitted task
    /// * `None` - The frontier is empty
    pub fn pop(&mut self) -> Option<CrawlTask> {
        self.frontier.pop().map(|queued| queued.task)
    }

    /// Drops every queued task, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.frontier.len();
        self.frontier.clear();
        dropped
    }

    /// Returns the number of tasks in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Returns whether the frontier is empty
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }
}
