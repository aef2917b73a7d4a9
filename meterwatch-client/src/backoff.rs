//! Reconnection budget with linear backoff.

use std::time::Duration;

/// Default number of automatic reconnection attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay between reconnection attempts.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(3000);

/// Reconnection budget owned by a channel manager.
///
/// Delays grow linearly: attempt `k` waits `base_delay × k`, so the defaults
/// give 3 s, 6 s, 9 s, 12 s and 15 s before giving up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with a fresh budget.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base_delay,
        }
    }

    /// Attempts consumed since the last successful connection.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay before attempt `k` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Whether another attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// Consume one attempt and return its delay, or `None` when the budget
    /// is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.can_retry() {
            return None;
        }
        self.attempt += 1;
        Some(self.delay_for(self.attempt))
    }

    /// Restore the full budget after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}
