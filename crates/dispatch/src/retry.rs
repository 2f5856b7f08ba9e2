//! Retry backoff configuration
//!
//! Exponential backoff with multiplicative jitter, expressed as pure
//! configuration consumed by the executor rather than ad hoc sleep calls.

use std::time::Duration;

use rand::RngExt;
use serde::Deserialize;

/// Backoff settings for transient-failure retries.
///
/// `delay_for(attempt)` doubles the base delay per attempt, applies a jitter
/// factor in `[1 - jitter, 1 + jitter]`, and clamps the result to
/// `[base_delay_ms, max_delay_ms]` so the delay never drops below the
/// configured minimum.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per credential, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, and the lower bound after jitter.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter fraction, 0.0 disables jitter.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_jitter() -> f64 {
    0.25
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_ms as f64 * 2f64.powi(attempt.min(16) as i32);
        let capped = base.min(self.max_delay_ms as f64);
        let jittered = if self.jitter > 0.0 {
            let factor = rand::rng().random_range(-self.jitter..=self.jitter);
            capped * (1.0 + factor)
        } else {
            capped
        };
        let bounded = jittered
            .max(self.base_delay_ms as f64)
            .min(self.max_delay_ms as f64);
        Duration::from_millis(bounded as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_without_jitter() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter: 0.0,
        }
    }

    #[test]
    fn delays_grow_exponentially_without_jitter() {
        let policy = policy_without_jitter();
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn delays_are_capped() {
        let policy = policy_without_jitter();
        assert_eq!(policy.delay_for(4), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(30), Duration::from_millis(1_000));
    }

    #[test]
    fn jittered_delay_stays_bounded() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter: 0.5,
        };
        for attempt in 0..8 {
            let delay = policy.delay_for(attempt);
            assert!(delay >= Duration::from_millis(100), "below minimum: {delay:?}");
            assert!(delay <= Duration::from_millis(1_000), "above cap: {delay:?}");
        }
    }

    #[test]
    fn deserializes_with_defaults() {
        let policy: RetryPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 500);
        assert_eq!(policy.max_delay_ms, 10_000);

        let policy: RetryPolicy = serde_json::from_str(r#"{"max_attempts": 7}"#).unwrap();
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.base_delay_ms, 500);
    }
}
