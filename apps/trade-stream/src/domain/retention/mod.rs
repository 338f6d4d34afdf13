//! Cache Retention Policy
//!
//! Decides whether a cached entry has aged out of the replay window.

use std::time::Duration;

/// Default replay window: two hours.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(2 * 60 * 60);

/// Age limit for replay cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl RetentionPolicy {
    /// Create a policy with the given window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    /// The configured window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Whether an entry written at `timestamp` is expired at `now`.
    ///
    /// Both values are seconds since the Unix epoch. An entry whose age equals
    /// the window is still retained.
    #[must_use]
    pub fn is_expired(&self, timestamp: i64, now: i64) -> bool {
        let age = now.saturating_sub(timestamp);
        let window = i64::try_from(self.window.as_secs()).unwrap_or(i64::MAX);
        age > window
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn default_window_is_two_hours() {
        assert_eq!(RetentionPolicy::default().window(), Duration::from_secs(7200));
    }

    #[test_case(NOW, false ; "fresh entry")]
    #[test_case(NOW - 7199, false ; "just inside window")]
    #[test_case(NOW - 7200, false ; "exactly at window")]
    #[test_case(NOW - 7201, true ; "just past window")]
    #[test_case(0, true ; "missing timestamp")]
    #[test_case(NOW + 60, false ; "clock skew into future")]
    fn expiry(timestamp: i64, expired: bool) {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.is_expired(timestamp, NOW), expired);
    }

    #[test]
    fn custom_window() {
        let policy = RetentionPolicy::new(Duration::from_secs(60));
        assert!(policy.is_expired(NOW - 61, NOW));
        assert!(!policy.is_expired(NOW - 60, NOW));
    }
}
