//! Failure backoff policy.
//!
//! After `k` consecutive failures the next check of a site waits
//! `interval * min(2^k, cap)`, so an unreachable host is polled less often
//! but never abandoned.

use std::time::Duration;

/// Backoff configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Largest multiplier applied to the base interval. Default: 8
    pub cap: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { cap: 8 }
    }
}

impl BackoffPolicy {
    pub fn new(cap: u32) -> Self {
        Self { cap: cap.max(1) }
    }

    /// Multiplier for the given failure streak.
    pub fn multiplier(&self, consecutive_failures: u32) -> u32 {
        let cap = self.cap.max(1);
        // 2^k overflows u32 at k = 32; anything past the cap is the cap.
        if consecutive_failures >= 31 {
            return cap;
        }
        (1u32 << consecutive_failures).min(cap)
    }

    /// Delay before the next check.
    pub fn delay(&self, interval: Duration, consecutive_failures: u32) -> Duration {
        interval.saturating_mul(self.multiplier(consecutive_failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failures_uses_interval() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.delay(Duration::from_secs(30), 0),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_exponential_growth() {
        let policy = BackoffPolicy::default();
        let interval = Duration::from_secs(30);
        assert_eq!(policy.delay(interval, 1), Duration::from_secs(60));
        assert_eq!(policy.delay(interval, 2), Duration::from_secs(120));
        assert_eq!(policy.delay(interval, 3), Duration::from_secs(240));
    }

    #[test]
    fn test_capped() {
        let policy = BackoffPolicy::new(8);
        let interval = Duration::from_secs(30);
        assert_eq!(policy.delay(interval, 4), Duration::from_secs(240));
        assert_eq!(policy.delay(interval, 40), Duration::from_secs(240));
        assert_eq!(policy.multiplier(u32::MAX), 8);
    }

    #[test]
    fn test_zero_cap_treated_as_one() {
        let policy = BackoffPolicy { cap: 0 };
        assert_eq!(policy.multiplier(5), 1);
        assert_eq!(BackoffPolicy::new(0).cap, 1);
    }
}
