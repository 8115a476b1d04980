//! Retry policy with exponential backoff
//!
//! Runs an async operation, asking an injected predicate whether each failure
//! is worth another attempt. Delays between attempts are awaited on the tokio
//! timer so other work keeps running.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Default maximum number of attempts
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the second attempt in milliseconds
const DEFAULT_INITIAL_DELAY_MS: u64 = 500;

/// Default upper bound for a single backoff delay in milliseconds
const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Retry configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt in milliseconds
    pub initial_delay_ms: u64,
    /// Cap for any single delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Backoff delay after the given (1-based) failed attempt
    ///
    /// `min(initial * 2^(attempt - 1), max)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Predicate deciding whether a failed attempt should be retried
pub type RetryPredicate<E> = Arc<dyn Fn(&E, u32) -> bool + Send + Sync>;

/// Retry policy with an injected retry predicate
pub struct RetryPolicy<E> {
    config: RetryConfig,
    should_retry: RetryPredicate<E>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            should_retry: Arc::clone(&self.should_retry),
        }
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: std::fmt::Display> RetryPolicy<E> {
    /// Create a policy that retries every failure until the attempt budget runs out
    pub fn new(config: RetryConfig) -> Self {
        Self::with_predicate(config, |_, _| true)
    }

    /// Create a policy with a custom retry predicate
    ///
    /// The predicate receives the error and the 1-based number of the attempt
    /// that just failed.
    pub fn with_predicate<P>(config: RetryConfig, should_retry: P) -> Self
    where
        P: Fn(&E, u32) -> bool + Send + Sync + 'static,
    {
        Self {
            config,
            should_retry: Arc::new(should_retry),
        }
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run the operation, retrying failures the predicate approves
    ///
    /// Returns the first success or the last error.
    pub async fn execute<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_observed(label, operation, |_| ControlFlow::Continue(()))
            .await
    }

    /// Run the operation, reporting every failed attempt to `observe`
    ///
    /// `observe` may return `ControlFlow::Break` to stop retrying regardless
    /// of what the predicate says.
    pub(crate) async fn execute_observed<T, F, Fut, O>(
        &self,
        label: &str,
        mut operation: F,
        mut observe: O,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        O: FnMut(&E) -> ControlFlow<()>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt: u32 = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let observed = observe(&e);

                    if observed.is_break() {
                        tracing::warn!("{} failed (attempt {}), giving up: {}", label, attempt, e);
                        return Err(e);
                    }

                    if attempt >= max_attempts || !(self.should_retry)(&e, attempt) {
                        tracing::error!("{} failed (attempt {}): {}", label, attempt, e);
                        return Err(e);
                    }

                    let delay = self.config.delay_for_attempt(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}), retrying in {}ms: {}",
                        label,
                        attempt,
                        delay.as_millis(),
                        e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
