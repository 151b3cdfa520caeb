//! Retry policy
//!
//! An item that failed `n` times waits `retry_delay * 2^n` before its next
//! attempt, capped at `max_delay`. Once `n` reaches `max_retries` the item
//! is quarantined instead of retried.

use std::time::Duration;

use tidesync_core::config::SyncConfig;

/// Retry ceiling and exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    retry_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, retry_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_retries,
            config.retry_delay(),
            config.max_retry_delay(),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns true once an item with `retry_count` failures must be quarantined
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }

    /// Delay before the next attempt of an item that failed `retry_count` times
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
        self.retry_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}
