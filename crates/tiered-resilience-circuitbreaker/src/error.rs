use std::time::Duration;
use thiserror::Error;
use tiered_resilience_core::ResilienceError;

/// Errors returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open, or half-open with every trial slot taken. The
    /// operation was not invoked.
    #[error("circuit '{name}' is open; call not permitted")]
    OpenCircuit {
        name: String,
        /// Time left until the breaker will admit a trial call, when known.
        retry_after: Option<Duration>,
    },

    /// The operation ran past the breaker's timeout. Counted as a failure.
    #[error("operation exceeded circuit breaker timeout of {timeout:?}")]
    Timeout { timeout: Duration },

    /// An error returned by the operation.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CircuitBreakerError::Timeout { .. })
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<CircuitBreakerError<E>> for ResilienceError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit { name, retry_after } => {
                ResilienceError::CircuitOpen { name, retry_after }
            }
            CircuitBreakerError::Timeout { .. } => ResilienceError::Timeout {
                layer: "circuit_breaker",
            },
            CircuitBreakerError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
