//! Bounded reconnection budget.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// RetryBudget
// ============================================================================

/// Counts automatic reconnection attempts against a fixed maximum.
///
/// `attempts` is reset on every successful open and grows by one per
/// scheduled reconnection. Once it reaches `max`, no further reconnection
/// is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    attempts: u32,
    max: u32,
    interval: Duration,
}

impl RetryBudget {
    /// Creates an unused budget.
    #[inline]
    #[must_use]
    pub const fn new(max: u32, interval: Duration) -> Self {
        Self {
            attempts: 0,
            max,
            interval,
        }
    }

    /// Attempts consumed since the last successful open.
    #[inline]
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Maximum consecutive attempts.
    #[inline]
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Delay before each attempt.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Attempts left before giving up.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.attempts)
    }

    /// Returns `true` once no attempt is left.
    #[inline]
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.attempts >= self.max
    }

    /// Takes one attempt. Returns `false` if the budget is exhausted.
    pub fn try_consume(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.attempts += 1;
        true
    }

    /// Restores the full budget.
    #[inline]
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_until_exhausted() {
        let mut budget = RetryBudget::new(3, Duration::from_millis(100));

        assert!(budget.try_consume());
        assert!(budget.try_consume());
        assert_eq!(budget.remaining(), 1);
        assert!(budget.try_consume());

        assert!(budget.is_exhausted());
        assert!(!budget.try_consume());
        assert_eq!(budget.attempts(), 3);
    }

    #[test]
    fn test_zero_budget_is_exhausted() {
        let mut budget = RetryBudget::new(0, Duration::ZERO);
        assert!(budget.is_exhausted());
        assert!(!budget.try_consume());
        assert_eq!(budget.attempts(), 0);
    }

    #[test]
    fn test_reset() {
        let mut budget = RetryBudget::new(2, Duration::from_secs(3));
        budget.try_consume();
        budget.try_consume();

        budget.reset();

        assert_eq!(budget.attempts(), 0);
        assert_eq!(budget.remaining(), 2);
        assert_eq!(budget.interval(), Duration::from_secs(3));
    }
}
