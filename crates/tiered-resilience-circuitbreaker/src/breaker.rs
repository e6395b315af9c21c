use crate::circuit::{Circuit, CircuitState, CircuitStats, Outcome, Permit};
use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::error::CircuitBreakerError;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;
use tiered_resilience_core::EventListeners;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A three-state circuit breaker around arbitrary async operations.
///
/// - **Closed**: calls run. Failures are counted; reaching
///   `failure_threshold` opens the circuit.
/// - **Open**: calls fail with [`CircuitBreakerError::OpenCircuit`] without
///   running. Once `reset_timeout` has passed since the circuit opened, the
///   next call moves it to half-open and runs.
/// - **HalfOpen**: up to `half_open_max_calls` trial calls run. Any failure
///   reopens the circuit and restarts the timer; that many successes close it.
///
/// Every call runs under `timeout`, and a call that runs longer counts as a
/// failure. On timeout the operation's future is dropped, which stops it at
/// its next `.await` but cannot recall work it already started elsewhere.
///
/// Clones share state.
#[derive(Clone)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    listeners: EventListeners<CircuitBreakerEvent>,
    circuit: Mutex<Circuit>,
    state_atomic: Arc<AtomicU8>,
}

impl Shared {
    /// Runs `f` under the lock, then emits whatever events it produced.
    fn with_circuit<R>(&self, f: impl FnOnce(&mut Circuit) -> R) -> R {
        let (result, events) = {
            let mut circuit = self.circuit.lock();
            let result = f(&mut circuit);
            (result, circuit.take_events())
        };
        for event in &events {
            self.listeners.emit(event);
        }
        result
    }
}

/// Hands back a half-open trial slot if the call is abandoned mid-flight.
struct PermitGuard<'a> {
    shared: &'a Shared,
    permit: Option<Permit>,
}

impl PermitGuard<'_> {
    fn settle(mut self, outcome: Outcome, duration: Duration) {
        if let Some(permit) = self.permit.take() {
            self.shared
                .with_circuit(|c| c.record(permit, outcome, duration));
        }
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.shared.with_circuit(|c| c.release(permit));
        }
    }
}

impl CircuitBreaker {
    /// Returns a builder with default thresholds.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "circuitbreaker_calls_total",
                "Total number of calls through the circuit breaker by outcome"
            );
            describe_counter!(
                "circuitbreaker_transitions_total",
                "Total number of circuit breaker state transitions"
            );
            describe_counter!(
                "circuitbreaker_timeouts_total",
                "Total number of calls that exceeded the circuit breaker timeout"
            );
            describe_gauge!(
                "circuitbreaker_state",
                "Current state (0 = closed, 1 = open, 2 = half-open)"
            );
            describe_histogram!(
                "circuitbreaker_call_duration_seconds",
                "Duration of calls through the circuit breaker"
            );
        });
        CircuitBreakerConfigBuilder::new()
    }

    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let circuit = Circuit::new(
            config.name.clone(),
            config.thresholds,
            Arc::clone(&state_atomic),
        );
        Self {
            shared: Arc::new(Shared {
                name: config.name,
                listeners: config.event_listeners,
                circuit: Mutex::new(circuit),
                state_atomic,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Runs `operation` if the circuit allows it.
    ///
    /// `operation` is never invoked while the circuit is open.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let shared = &*self.shared;
        let acquired = shared.with_circuit(|c| c.try_acquire().map(|p| (p, c.timeout())));

        let (permit, timeout) = match acquired {
            Ok(acquired) => acquired,
            Err(retry_after) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(breaker = %shared.name, ?retry_after, "circuit breaker rejected call");

                return Err(CircuitBreakerError::OpenCircuit {
                    name: shared.name.clone(),
                    retry_after,
                });
            }
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(breaker = %shared.name, "circuit breaker permitted call");

        let guard = PermitGuard {
            shared,
            permit: Some(permit),
        };
        let start = tokio::time::Instant::now();
        let result = tokio::time::timeout(timeout, operation()).await;
        let duration = start.elapsed();

        match result {
            Ok(Ok(value)) => {
                guard.settle(Outcome::Success, duration);
                Ok(value)
            }
            Ok(Err(err)) => {
                guard.settle(Outcome::Failure, duration);
                Err(CircuitBreakerError::Inner(err))
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(breaker = %shared.name, ?timeout, "operation timed out; counted as failure");

                #[cfg(feature = "metrics")]
                counter!(
                    "circuitbreaker_timeouts_total",
                    "circuitbreaker" => shared.name.clone()
                )
                .increment(1);

                shared.listeners.emit(&CircuitBreakerEvent::CallTimedOut {
                    pattern_name: shared.name.clone(),
                    timestamp: std::time::Instant::now(),
                    timeout,
                });
                guard.settle(Outcome::Timeout, duration);
                Err(CircuitBreakerError::Timeout { timeout })
            }
        }
    }

    /// Current state, read without taking the lock.
    ///
    /// An open circuit whose reset timeout has passed still reads as open
    /// until the next call moves it to half-open.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state_atomic.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn stats(&self) -> CircuitStats {
        self.shared.circuit.lock().stats()
    }

    /// Closes the circuit and zeroes every counter. Outcomes of calls still
    /// in flight are counted but cannot move the new state.
    pub fn reset(&self) {
        self.shared.with_circuit(Circuit::reset);

        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.shared.name, "circuit breaker reset");
    }

    /// Opens the circuit regardless of recent outcomes. It half-opens again
    /// after `reset_timeout` like any other open circuit.
    pub fn force_open(&self) {
        self.shared.with_circuit(Circuit::force_open);
    }

    /// Closes the circuit regardless of recent outcomes, keeping statistics.
    pub fn force_closed(&self) {
        self.shared.with_circuit(Circuit::force_closed);
    }

    /// Returns the HTTP status code appropriate for health checks.
    ///
    /// Returns 200 when closed or half-open, 503 when open.
    pub fn http_status(&self) -> u16 {
        match self.state() {
            CircuitState::Closed => 200,
            CircuitState::HalfOpen => 200,
            CircuitState::Open => 503,
        }
    }

    /// Returns a simple health status string.
    ///
    /// Returns "healthy" when circuit is closed, "degraded" when half-open,
    /// "unhealthy" when open.
    pub fn health_status(&self) -> &'static str {
        match self.state() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish()
    }
}
