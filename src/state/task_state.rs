/// Crawl task lifecycle
///
/// A task moves `Pending -> Fetching -> (Extracted | Skipped) -> Expanded -> Done`.
/// A skipped task goes straight to `Done`, and an extracted task at the depth
/// floor finishes without expanding.
use crate::RufusError;
use std::fmt;

/// Represents the current state of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Admitted to the frontier, not yet dispatched
    Pending,

    /// Dispatched; the fetch (and possibly a render) is in flight
    Fetching,

    /// Page fetched and its content extracted
    Extracted,

    /// Page abandoned; see the accompanying `SkipReason`
    Skipped,

    /// Child links validated and handed to the frontier
    Expanded,

    /// Task finished
    Done,
}

impl TaskState {
    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Pending, Skipped)
                | (Fetching, Extracted)
                | (Fetching, Skipped)
                | (Extracted, Expanded)
                | (Extracted, Done)
                | (Skipped, Done)
                | (Expanded, Done)
        )
    }

    /// Moves to `next`, rejecting illegal transitions
    pub fn transition(self, next: TaskState) -> Result<TaskState, RufusError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(RufusError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Returns true once no further work will happen for the task
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Extracted => "extracted",
            Self::Skipped => "skipped",
            Self::Expanded => "expanded",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a page contributed no record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkipReason {
    /// Non-success HTTP status other than 429
    HttpStatus(u16),
    /// 429 responses outlasted the retry budget
    RateLimited,
    /// Connection, timeout, or protocol failure
    Network,
    /// Response body could not be read as text
    Body,
    /// Redirected onto a URL this session already claimed
    RedirectVisited,
    /// Session cancelled while the task was in flight
    Cancelled,
    /// Fetched, but nothing passed the relevance filter
    NoRelevantContent,
    /// Content fingerprint already accepted from another URL
    Duplicate,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStatus(code) => write!(f, "http_{}", code),
            Self::RateLimited => f.write_str("rate_limited"),
            Self::Network => f.write_str("network"),
            Self::Body => f.write_str("body"),
            Self::RedirectVisited => f.write_str("redirect_visited"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::NoRelevantContent => f.write_str("no_relevant_content"),
            Self::Duplicate => f.write_str("duplicate"),
        }
    }
}
