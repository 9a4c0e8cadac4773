//! Session-wide failure-rate circuit breaker

use crate::config::BreakerConfig;
use std::collections::VecDeque;

/// Sliding window over the most recent fetch outcomes
#[derive(Debug, Clone)]
pub struct FailureBreaker {
    window: usize,
    min_samples: usize,
    max_failure_rate: f64,
    outcomes: VecDeque<bool>,
    failures: usize,
}

impl FailureBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            window: config.window.max(1),
            min_samples: config.min_samples,
            max_failure_rate: config.max_failure_rate,
            outcomes: VecDeque::with_capacity(config.window),
            failures: 0,
        }
    }

    /// Records one fetch outcome, evicting the oldest when the window is full
    pub fn record(&mut self, success: bool) {
        if self.outcomes.len() == self.window {
            if let Some(false) = self.outcomes.pop_front() {
                self.failures -= 1;
            }
        }
        self.outcomes.push_back(success);
        if !success {
            self.failures += 1;
        }
    }

    /// Fraction of failures in the current window
    pub fn failure_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.failures as f64 / self.outcomes.len() as f64
    }

    /// Returns true once enough samples exist and the failure rate reaches the limit
    pub fn is_tripped(&self) -> bool {
        self.outcomes.len() >= self.min_samples && self.failure_rate() >= self.max_failure_rate
    }

    pub fn samples(&self) -> usize {
        self.outcomes.len()
    }
}
