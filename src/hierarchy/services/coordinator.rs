//! Retry policies for the transaction coordinator.
//!
//! Every operation attempt reads a fresh working set, plans purely in
//! memory, and commits one batch. A conflict — the store's version check or
//! a declared-position mismatch — means the attempt raced another commit;
//! the coordinator waits with exponential backoff and starts over from
//! fresh reads. Conflicts the retries cannot absorb surface to the caller
//! unchanged.

use crate::hierarchy::domain::MutationIntent;
use std::time::Duration;

/// Bounded-retry configuration for one class of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry; later retries double it each time.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Policy for hierarchy-wide propagation operations (reparent, archive,
    /// delete, duplicate, container-crossing moves).
    pub const PROPAGATION: Self = Self {
        max_attempts: 5,
        base_delay: Duration::from_millis(100),
    };

    /// Policy for single-ordering operations (reorders, creates, updates).
    pub const SIBLING: Self = Self {
        max_attempts: 3,
        base_delay: Duration::from_millis(100),
    };

    /// Creates a policy.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Selects the default policy for an intent.
    #[must_use]
    pub const fn for_intent(intent: &MutationIntent) -> Self {
        if intent.propagates() {
            Self::PROPAGATION
        } else {
            Self::SIBLING
        }
    }

    /// Delay to wait after the given 1-based attempt failed:
    /// `base_delay * 2^(attempt - 1)`, saturating.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}
