//! Resilience primitives
//!
//! Retry with exponential backoff and a circuit breaker, generic over the
//! operation and its error type. Nothing in here knows about speech; the
//! recognition controller injects its own retry predicate and error
//! classification.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitError};
pub use retry::{RetryConfig, RetryPolicy};

/// Errors that can be fed through the resilience primitives
pub trait RetryableError: std::error::Error {
    /// Whether a failed attempt with this error counts toward the circuit
    /// breaker's failure accounting
    fn counts_as_failure(&self) -> bool {
        true
    }
}
