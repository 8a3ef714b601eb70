//! Fixed-delay bounded retry
//!
//! Every sync step runs under the same policy: up to `max_attempts`
//! attempts with the same delay between them, no exponential growth.
//! Failures are classified through `backoff::Error`; a `Permanent` error
//! stops retrying immediately, everything else keeps retrying until the
//! attempt budget runs out and the last failure is surfaced.

use backoff::backoff::Backoff;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::RetryConfig;

/// Yields the same delay a fixed number of times, then gives up
struct FixedDelay {
    delay: Duration,
    retries_left: u32,
    max_retries: u32,
}

impl FixedDelay {
    fn new(delay: Duration, max_retries: u32) -> Self {
        Self {
            delay,
            retries_left: max_retries,
            max_retries,
        }
    }
}

impl Backoff for FixedDelay {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries_left == 0 {
            None
        } else {
            self.retries_left -= 1;
            Some(self.delay)
        }
    }

    fn reset(&mut self) {
        self.retries_left = self.max_retries;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.delay_seconds))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails permanently, or the attempt
    /// budget is exhausted. The delay is a non-blocking await.
    pub async fn execute<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, backoff::Error<E>>>,
        E: Display,
    {
        let attempt = AtomicU32::new(1);
        let max_attempts = self.max_attempts;

        backoff::future::retry_notify(
            FixedDelay::new(self.delay, max_attempts.saturating_sub(1)),
            op,
            |err: E, delay: Duration| {
                let n = attempt.fetch_add(1, Ordering::Relaxed);
                warn!("{}: attempt {}/{} failed: {}", label, n, max_attempts, err);
                info!("{}: retrying in {}s", label, delay.as_secs());
            },
        )
        .await
    }
}
