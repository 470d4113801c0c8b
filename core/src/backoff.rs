use crate::config::CleanupConfig;
use backoff::backoff::{Backoff, Constant};
use std::time::Duration;

/// Bounded retry with a fixed pause between attempts. No jitter, no growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &CleanupConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    pub fn create_backoff(&self) -> Constant {
        Constant::new(self.delay)
    }

    /// Pause to take after the given failed attempt, `None` once attempts are exhausted.
    pub fn delay_after(&self, attempt: u32, backoff: &mut impl Backoff) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(backoff.next_backoff().unwrap_or(self.delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
