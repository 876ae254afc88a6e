use std::time::Duration;

use crate::config::RetryqConfig;

/// High-level classification of a transport failure. Used in diagnostics;
/// every kind is retried the same way for queued requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Other 5xx status.
    Http5xx(u16),
    Other,
}

/// Bounded retry policy with exponential backoff between drain passes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Failures after which a queued request is removed for good.
    pub max_request_retries: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_request_retries: 10,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &RetryqConfig) -> Self {
        let backoff = cfg.backoff.clone().unwrap_or_default();
        Self {
            max_request_retries: cfg.max_request_retries.max(1),
            base_delay: Duration::try_from_secs_f64(backoff.base_delay_secs)
                .unwrap_or(Duration::from_millis(250)),
            max_delay: Duration::from_secs(backoff.max_delay_secs),
        }
    }

    /// True once a queued request with this many failures must be dropped.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_request_retries
    }

    /// Backoff before attempt `attempt` (1-based): base * 2^(attempt-1), capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        self.base_delay.saturating_mul(exp).min(self.max_delay)
    }
}
