use std::time::Duration;

/// Retry ceiling and exponential backoff for failed deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts after which an entry becomes terminally failed.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 5;
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(16000);

    /// Delay after a failed attempt made with `retries` prior failures:
    /// `min(base_delay * 2^retries, max_delay)`.
    pub fn backoff(&self, retries: u32) -> Duration {
        let factor = 2u32.saturating_pow(retries);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    pub fn is_exhausted(&self, retries: u32) -> bool {
        retries >= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
        }
    }
}
