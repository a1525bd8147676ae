
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::{LoreError, Result};

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Bounded exponential backoff for embedding requests.
///
/// Attempt `n` that fails with a transient error waits `base_delay * 2^(n-1)` (capped at
/// `max_delay`) before attempt `n + 1`. After `max_attempts` the last error is escalated to
/// [`LoreError::ProviderUnavailable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS)
    }
}

impl RetryPolicy {
    #[inline]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay after the given (1-based) failed attempt
    #[inline]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Run `request_fn` until it succeeds, fails permanently, or attempts run out
    #[inline]
    pub fn run<T, F>(&self, target: &str, mut request_fn: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            debug!("Request to {} attempt {}/{}", target, attempt, self.max_attempts);

            match request_fn() {
                Ok(value) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(value);
                }
                Err(err) => {
                    let classified = classify(&err);
                    if !is_transient(&classified) {
                        warn!("Non-retryable error from {}: {}", target, err);
                        return Err(classified);
                    }

                    warn!(
                        "Transient error from {}: {}, attempt {}/{}",
                        target, err, attempt, self.max_attempts
                    );
                    last_error = Some(classified);

                    if attempt < self.max_attempts {
                        let delay = self.delay_for(attempt);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!(
            "All {} attempts failed for request to {}",
            self.max_attempts, target
        );

        Err(LoreError::ProviderUnavailable(format!(
            "{} unreachable after {} attempts: {}",
            target,
            self.max_attempts,
            last_error.map_or_else(|| "no attempts made".to_string(), |e| e.to_string())
        )))
    }
}

/// Map a transport error onto the crate taxonomy
fn classify(err: &ureq::Error) -> LoreError {
    match err {
        ureq::Error::StatusCode(429) => LoreError::TransientRateLimit("HTTP 429".to_string()),
        ureq::Error::StatusCode(status) if *status >= 500 => {
            LoreError::TransientRateLimit(format!("server error: HTTP {}", status))
        }
        ureq::Error::StatusCode(status) => {
            LoreError::ProviderUnavailable(format!("client error: HTTP {}", status))
        }
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => LoreError::TransientRateLimit(format!("transport error: {}", err)),
        _ => LoreError::ProviderUnavailable(err.to_string()),
    }
}

fn is_transient(err: &LoreError) -> bool {
    matches!(err, LoreError::TransientRateLimit(_))
}
