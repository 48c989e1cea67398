//! Backoff policy for the fallback dispatcher
//!
//! Delays grow exponentially from `initial_delay` by `multiplier` and are
//! capped at `max_delay`. There is no jitter: the same round always waits the
//! same amount, which keeps dispatch deterministic and testable.

use std::time::Duration;

/// Configuration for backoff behavior on the last credential
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Maximum number of extra rounds on the last credential
    pub max_backoff_rounds: u32,

    /// Delay before the first backoff round
    pub initial_delay: Duration,

    /// Maximum delay between rounds (caps exponential growth)
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (typically 2.0)
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_backoff_rounds: 2,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(20),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_backoff_rounds(mut self, rounds: u32) -> Self {
        self.max_backoff_rounds = rounds;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before backoff round `round` (0-indexed)
    pub fn delay_for(&self, round: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(round as i32);
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Delay for a round, raised to a service-supplied hint but never past
    /// `max_delay`
    pub fn delay_with_hint(&self, round: u32, hint: Option<Duration>) -> Duration {
        let base = self.delay_for(round);
        match hint {
            Some(hint) => base.max(hint.min(self.max_delay)),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_backoff_rounds, 2);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(20));
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = BackoffPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_multiplier(2.0)
            .with_max_delay(Duration::from_secs(10));

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_respects_max() {
        let policy = BackoffPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(500));

        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
        assert_eq!(policy.delay_for(10), Duration::from_millis(500));
    }

    #[test]
    fn test_delay_is_deterministic() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(1), policy.delay_for(1));
    }

    #[test]
    fn test_hint_raises_delay_up_to_cap() {
        let policy = BackoffPolicy::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(20));

        assert_eq!(
            policy.delay_with_hint(0, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay_with_hint(0, Some(Duration::from_secs(60))),
            Duration::from_secs(20)
        );
        assert_eq!(
            policy.delay_with_hint(1, Some(Duration::from_millis(10))),
            Duration::from_secs(2)
        );
    }
}
