//! Retry with exponential back-off and jitter around capability calls.
//!
//! [`RetryPolicy`] is a plain value so call sites can share one policy and
//! tests can run it with a zero base delay. Which errors are worth retrying is
//! decided per call by a predicate rather than baked into the policy.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::error::CollectError;

/// Boxed future as returned by capability trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub backoff_base: Duration,
    /// Upper bound for any single delay, before jitter.
    pub max_delay: Duration,
    /// Multiply each delay by a random factor in `[0.75, 1.25]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: true,
        }
    }

    /// Back-off before retry number `attempt` (1-based), without jitter.
    ///
    /// | Attempt | Delay            |
    /// |---------|------------------|
    /// | 1       | base × 2⁰        |
    /// | 2       | base × 2¹        |
    /// | 3       | base × 2²        |
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        delay.mul_f64(rand::random::<f64>() * 0.5 + 0.75)
    }

    /// Jittered delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.jittered(self.delay_for(attempt))
    }

    /// Runs `operation` against `ctx`, retrying errors for which
    /// `is_retriable` returns `true`.
    ///
    /// The operation receives the context on every attempt, which lets it
    /// drive a `&mut` capability such as a browser session. Non-retriable
    /// errors, and the last error once retries are exhausted, are returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error produced by the final attempt.
    pub async fn run<C, T, F, P>(
        &self,
        label: &str,
        ctx: &mut C,
        mut operation: F,
        is_retriable: P,
    ) -> Result<T, CollectError>
    where
        C: ?Sized,
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, Result<T, CollectError>>,
        P: Fn(&CollectError) -> bool,
    {
        let mut attempt = 0u32;
        loop {
            match operation(&mut *ctx).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !is_retriable(&err) || attempt >= self.max_retries {
                        return Err(err);
                    }
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        operation = label,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient failure, retrying after back-off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
