//! Circuit breaker
//!
//! Wraps a [`RetryPolicy`] and stops attempting an operation for a cooldown
//! period after repeated failures. Counters live behind a mutex and are only
//! handed out as `Copy` snapshots.

use super::retry::RetryPolicy;
use super::RetryableError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of failures that opens the breaker
const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default cooldown before an open breaker lets a trial through (ms)
const DEFAULT_RESET_TIMEOUT_MS: u64 = 30_000;

/// Default window in which failures accumulate (ms)
const DEFAULT_MONITORING_WINDOW_MS: u64 = 60_000;

/// Circuit breaker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures within the monitoring window that open the breaker
    pub failure_threshold: u32,
    /// Cooldown after the last failure before the breaker closes again (ms)
    pub reset_timeout_ms: u64,
    /// A failure further than this from the previous one restarts the count (ms)
    pub monitoring_window_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
            monitoring_window_ms: DEFAULT_MONITORING_WINDOW_MS,
        }
    }
}

impl CircuitBreakerConfig {
    fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    fn monitoring_window(&self) -> Duration {
        Duration::from_millis(self.monitoring_window_ms)
    }
}

/// Snapshot of the breaker counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CircuitBreakerState {
    /// Whether calls are currently rejected
    pub is_open: bool,
    /// Failures recorded in the current window
    pub failure_count: u32,
    /// When the most recent failure was recorded
    pub last_failure_time: Option<Instant>,
    /// When the most recent success was recorded
    pub last_success_time: Option<Instant>,
}

/// Error returned by [`CircuitBreaker::execute`]
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CircuitError<E> {
    #[error("Circuit breaker is open")]
    Open,

    #[error("{0}")]
    Operation(E),
}

/// Circuit breaker around a retry policy
#[derive(Debug)]
pub struct CircuitBreaker<E> {
    config: CircuitBreakerConfig,
    retry: RetryPolicy<E>,
    state: Mutex<CircuitBreakerState>,
}

impl<E> CircuitBreaker<E>
where
    E: RetryableError,
{
    /// Create a closed breaker
    pub fn new(config: CircuitBreakerConfig, retry: RetryPolicy<E>) -> Self {
        Self {
            config,
            retry,
            state: Mutex::new(CircuitBreakerState::default()),
        }
    }

    /// Get the breaker configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Get a snapshot of the counters
    pub fn state(&self) -> CircuitBreakerState {
        *self.state.lock()
    }

    /// Whether calls are currently rejected
    ///
    /// An open breaker whose cooldown has elapsed reports closed; the next
    /// `execute` call clears it.
    pub fn is_open(&self) -> bool {
        let state = self.state.lock();
        state.is_open && !self.cooldown_elapsed(&state)
    }

    /// Force the breaker closed and clear the failure count
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.is_open = false;
        state.failure_count = 0;
        tracing::info!("Circuit breaker reset");
    }

    /// Record a failure and open the breaker if the threshold is reached
    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        let now = Instant::now();

        let window_expired = state
            .last_failure_time
            .is_some_and(|last| now.duration_since(last) > self.config.monitoring_window());
        if window_expired && !state.is_open {
            state.failure_count = 0;
        }

        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_time = Some(now);

        if !state.is_open && state.failure_count >= self.config.failure_threshold {
            state.is_open = true;
            tracing::warn!(
                "Circuit breaker opened after {} failures",
                state.failure_count
            );
        } else {
            tracing::debug!(
                "Circuit breaker recorded failure {}/{}",
                state.failure_count,
                self.config.failure_threshold
            );
        }
    }

    /// Record a success, closing the breaker
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.is_open || state.failure_count > 0 {
            tracing::info!("Circuit breaker closed after success");
        }
        state.is_open = false;
        state.failure_count = 0;
        state.last_success_time = Some(Instant::now());
    }

    /// Run the operation through the retry policy, guarded by the breaker
    ///
    /// Fails fast with [`CircuitError::Open`] while the breaker is open and
    /// cooling down. Retries stop as soon as a recorded failure opens it.
    pub async fn execute<T, F, Fut>(&self, label: &str, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if !self.admit(label) {
            return Err(CircuitError::Open);
        }

        let result = self
            .retry
            .execute_observed(label, operation, |e| {
                if !e.counts_as_failure() {
                    return ControlFlow::Continue(());
                }
                self.record_failure();
                if self.state.lock().is_open {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await;

        match result {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(e) => Err(CircuitError::Operation(e)),
        }
    }

    /// Check the breaker before an attempt, closing it if the cooldown elapsed
    fn admit(&self, label: &str) -> bool {
        let mut state = self.state.lock();
        if !state.is_open {
            return true;
        }

        if self.cooldown_elapsed(&state) {
            tracing::info!("Circuit breaker cooldown elapsed, allowing {}", label);
            state.is_open = false;
            state.failure_count = 0;
            return true;
        }

        tracing::warn!("Circuit breaker open, rejecting {}", label);
        false
    }

    fn cooldown_elapsed(&self, state: &CircuitBreakerState) -> bool {
        match state.last_failure_time {
            Some(last) => last.elapsed() >= self.config.reset_timeout(),
            None => true,
        }
    }
}
