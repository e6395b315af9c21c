use crate::breaker::CircuitBreaker;
use crate::circuit::CircuitState;
use crate::events::CircuitBreakerEvent;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tiered_resilience_core::{ConfigError, EventListeners};

/// How failures accumulate while the circuit is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCountPolicy {
    /// Every failure since the circuit last closed counts; successes do not
    /// clear the counter.
    #[default]
    SinceReset,
    /// A success clears the counter, so only an unbroken run of failures
    /// opens the circuit.
    Consecutive,
}

/// The thresholds a breaker enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Thresholds {
    pub(crate) failure_threshold: usize,
    pub(crate) reset_timeout: Duration,
    pub(crate) half_open_max_calls: usize,
    pub(crate) timeout: Duration,
    pub(crate) failure_count_policy: FailureCountPolicy,
}

impl Thresholds {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        const PATTERN: &str = "circuit_breaker";
        ConfigError::require_nonzero(PATTERN, "failure_threshold", self.failure_threshold as u128)?;
        ConfigError::require_nonzero(
            PATTERN,
            "half_open_max_calls",
            self.half_open_max_calls as u128,
        )?;
        ConfigError::require_nonzero(PATTERN, "reset_timeout", self.reset_timeout.as_millis())?;
        ConfigError::require_nonzero(PATTERN, "timeout", self.timeout.as_millis())?;
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            half_open_max_calls: 3,
            timeout: Duration::from_secs(10),
            failure_count_policy: FailureCountPolicy::SinceReset,
        }
    }
}

/// Validated circuit breaker configuration.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) thresholds: Thresholds,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder {
    thresholds: Thresholds,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            thresholds: Thresholds::default(),
            event_listeners: EventListeners::new(),
            name: "circuit_breaker".to_string(),
        }
    }

    /// Sets how many failures open the circuit.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.thresholds.failure_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open before the next call is let
    /// through as a trial.
    ///
    /// Default: 60 seconds
    pub fn reset_timeout(mut self, duration: Duration) -> Self {
        self.thresholds.reset_timeout = duration;
        self
    }

    /// Sets how many trial calls the half-open state admits. The same number
    /// of successes closes the circuit.
    ///
    /// Default: 3
    pub fn half_open_max_calls(mut self, calls: usize) -> Self {
        self.thresholds.half_open_max_calls = calls;
        self
    }

    /// Sets the per-call deadline. A call that runs longer counts as a failure.
    ///
    /// Default: 10 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.thresholds.timeout = timeout;
        self
    }

    /// Default: [`FailureCountPolicy::SinceReset`]
    pub fn failure_count_policy(mut self, policy: FailureCountPolicy) -> Self {
        self.thresholds.failure_count_policy = policy;
        self
    }

    /// Gives this circuit breaker instance a name for observability.
    ///
    /// Default: "circuit_breaker"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a state transition occurs.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState, CircuitState)` - the state left and the state entered.
    ///
    /// # Example
    /// ```rust
    /// use tiered_resilience_circuitbreaker::{CircuitBreaker, CircuitState};
    ///
    /// let breaker = CircuitBreaker::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("circuit opened (was {from:?})");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        });
        self
    }

    /// Registers a callback when a call is permitted.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState)` - the state the call was admitted in.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Registers a callback when a call is rejected without running.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let CircuitBreakerEvent::CallRejected { .. } = event {
                f();
            }
        });
        self
    }

    /// Registers a callback when a success is recorded.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState)` - the state when the success was recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Registers a callback when a failure, including a timeout, is recorded.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState)` - the state when the failure was recorded.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                f(*state);
            }
        });
        self
    }

    /// Validates the configuration without building.
    pub fn into_config(self) -> Result<CircuitBreakerConfig, ConfigError> {
        self.thresholds.validate()?;
        Ok(CircuitBreakerConfig {
            thresholds: self.thresholds,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }

    /// Builds the breaker.
    ///
    /// Fails if any threshold or duration is zero.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        self.into_config().map(CircuitBreaker::new)
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
