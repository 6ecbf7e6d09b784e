//! Bounded retry with exponential backoff
//!
//! Used for certificate store listings: a transient store hiccup is retried
//! inside the same cycle before the cycle is given up.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use autorenew_config::StoreFailureConfig;

use crate::shutdown::ShutdownSignal;

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Ceiling for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(config: &StoreFailureConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.initial_backoff(),
            config.max_backoff(),
        )
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Why [`retry_with_backoff`] gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed; carries the last error
    Exhausted { last: E, attempts: u32 },
    /// Shutdown was requested during a backoff wait
    Cancelled { attempts: u32 },
}

/// Run `operation` until it succeeds, attempts run out, or shutdown is
/// requested while waiting between attempts.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    shutdown: &mut ShutdownSignal,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if attempt >= policy.max_attempts => {
                return Err(RetryError::Exhausted {
                    last: error,
                    attempts: attempt,
                });
            }
            Err(error) => {
                let backoff = policy.backoff_after(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );

                tokio::select! {
                    biased;
                    _ = shutdown.requested() => {
                        return Err(RetryError::Cancelled { attempts: attempt });
                    }
                    _ = tokio::time::sleep(backoff) => {}
                }

                attempt += 1;
            }
        }
    }
}
