//! Cooperative limits for searches over the index and the graph.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::QueryError;

/// How often, in expansions, the wall clock is sampled.
const CLOCK_SAMPLE_INTERVAL: usize = 32;

/// Static limits applied to every search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Upper bound on expansion steps (graph nodes settled or index candidates visited).
    pub max_expansions: usize,
    /// Wall-clock budget measured from the start of the search.
    pub timeout: Option<Duration>,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_expansions: 200_000,
            timeout: Some(Duration::from_secs(2)),
        }
    }
}

impl SearchLimits {
    /// Limits that never trip.
    pub const fn unlimited() -> Self {
        Self {
            max_expansions: usize::MAX,
            timeout: None,
        }
    }
}

/// Per-query budget checked at every expansion step.
#[derive(Debug)]
pub struct SearchBudget {
    limits: SearchLimits,
    cancel: CancellationToken,
    started: Instant,
    expansions: usize,
}

impl SearchBudget {
    /// Start a budget that observes `cancel`.
    pub fn new(limits: SearchLimits, cancel: CancellationToken) -> Self {
        Self {
            limits,
            cancel,
            started: Instant::now(),
            expansions: 0,
        }
    }

    /// A budget with no limits and no external cancellation.
    pub fn unlimited() -> Self {
        Self::new(SearchLimits::unlimited(), CancellationToken::new())
    }

    /// Record one expansion step and fail if any limit is exceeded.
    pub fn tick(&mut self) -> Result<(), QueryError> {
        if self.cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }
        self.expansions += 1;
        if self.expansions > self.limits.max_expansions {
            return Err(self.timeout());
        }
        if let Some(limit) = self.limits.timeout
            && self.expansions % CLOCK_SAMPLE_INTERVAL == 1
            && self.started.elapsed() > limit
        {
            return Err(self.timeout());
        }
        Ok(())
    }

    /// Expansions recorded so far.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    fn timeout(&self) -> QueryError {
        QueryError::Timeout {
            expansions: self.expansions,
            elapsed: self.started.elapsed(),
        }
    }
}
