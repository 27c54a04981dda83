use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    #[default]
    ExponentialBackoff,
    LinearBackoff,
    FixedDelay,
}

/// Bounded retry schedule for a failed drain run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total runs, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: RetryStrategy,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: RetryStrategy::ExponentialBackoff,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single run, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the retry that follows failed run number `attempt`
    /// (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let step = attempt.max(1);
        let delay = match self.strategy {
            RetryStrategy::ExponentialBackoff => self
                .base_delay
                .saturating_mul(2_u32.saturating_pow(step - 1)),
            RetryStrategy::LinearBackoff => self.base_delay.saturating_mul(step),
            RetryStrategy::FixedDelay => self.base_delay,
        };
        let capped = delay.min(self.max_delay);

        if self.jitter {
            apply_jitter(capped)
        } else {
            capped
        }
    }
}

fn apply_jitter(delay: Duration) -> Duration {
    let mut rng = rand::rng();
    let factor: f64 = rng.random_range(0.5..1.5);
    Duration::from_secs_f64(delay.as_secs_f64() * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: RetryStrategy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            strategy,
            jitter: false,
        }
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let p = policy(RetryStrategy::ExponentialBackoff);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(400));
        assert_eq!(p.delay_for(4), Duration::from_millis(500));
        assert_eq!(p.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_linear_and_fixed() {
        let linear = policy(RetryStrategy::LinearBackoff);
        assert_eq!(linear.delay_for(3), Duration::from_millis(300));

        let fixed = policy(RetryStrategy::FixedDelay);
        assert_eq!(fixed.delay_for(1), fixed.delay_for(4));
    }

    #[test]
    fn test_jitter_stays_within_half_either_side() {
        let p = RetryPolicy {
            jitter: true,
            ..policy(RetryStrategy::FixedDelay)
        };
        for _ in 0..100 {
            let delay = p.delay_for(1);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_attempts_are_bounded() {
        let p = policy(RetryStrategy::FixedDelay);
        assert!(p.should_retry(4));
        assert!(!p.should_retry(5));
        assert!(!RetryPolicy::none().should_retry(1));
    }
}
