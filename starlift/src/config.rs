//! Run configuration threaded through graph construction and execution.
//!
//! All knobs live here explicitly; there is no ambient global state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry behavior applied uniformly to every task kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total executions of the task body, including the first (default 3).
    pub max_attempts: u32,
    /// Fixed delay between attempts (default 5 minutes).
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the fixed inter-attempt delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A policy that never retries. Useful in tests.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Retry policy applied to every task.
    pub retry: RetryPolicy,
    /// Worker pool bound. `None` leaves concurrency unconstrained beyond
    /// warehouse connection limits.
    pub max_workers: Option<usize>,
    /// Ceiling on a single task attempt. A timeout counts as a failed
    /// attempt under the retry policy.
    pub attempt_timeout: Option<Duration>,
}

impl RunConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Bounds the worker pool.
    #[must_use]
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }
}
