//! Retry policy for transient provider failures.

use std::time::Duration;

/// Exponential backoff with optional ±50% jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let seconds = (self.base.as_secs_f64() * self.factor.powi(exponent))
            .min(self.max.as_secs_f64());
        let delay = Duration::from_secs_f64(seconds.max(0.0));
        if !self.jitter {
            return delay;
        }

        let half = delay.as_millis() as u64 / 2;
        let offset = fastrand::u64(0..=half * 2);
        Duration::from_millis((delay.as_millis() as u64 + offset).saturating_sub(half))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Fixed, jitter-free delays; mostly useful in tests.
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff {
                base: delay,
                factor: 1.0,
                max: delay,
                jitter: false,
            },
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}
