use rand::Rng;
use std::time::Duration;

use crate::error::Error;

/// Bounded retry for transient exchange failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Jitter as a fraction of the delay (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.base_delay, self.max_delay, self.jitter)
    }
}

/// Exponential backoff with jitter.
///
/// Formula: min(max_delay, base * 2^attempt) +/- jitter. Rate-limit errors
/// start from twice the base delay.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max_delay: Duration, jitter_factor: f64) -> Self {
        Self {
            base,
            max_delay,
            // Negative jitter would make gen_range panic
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    /// Delay before retrying after `error`, advancing the attempt counter.
    pub fn delay_for(&mut self, error: &Error) -> Duration {
        let base = match error {
            Error::RateLimited(_) => self.base.saturating_mul(2),
            _ => self.base,
        };
        self.next_delay_from(base)
    }

    pub fn next_delay(&mut self) -> Duration {
        self.next_delay_from(self.base)
    }

    fn next_delay_from(&mut self, base: Duration) -> Duration {
        let exp_delay = base.saturating_mul(2u32.saturating_pow(self.attempt));
        let capped_delay = exp_delay.min(self.max_delay);

        let jitter_range = capped_delay.as_secs_f64() * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        let final_secs = (capped_delay.as_secs_f64() + jitter).max(0.0);

        self.attempt = self.attempt.saturating_add(1);

        Duration::from_secs_f64(final_secs)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
