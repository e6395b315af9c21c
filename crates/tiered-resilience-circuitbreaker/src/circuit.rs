use crate::config::{FailureCountPolicy, Thresholds};
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tiered_resilience_core::RollingWindow;
use tokio::time::Instant;

/// Response times kept for the rolling average.
const RESPONSE_WINDOW: usize = 100;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a limited number of trial calls are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Snapshot returned by [`CircuitBreaker::stats`](crate::CircuitBreaker::stats).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitStats {
    pub name: String,
    pub state: CircuitState,
    /// Calls that ran since the last reset, whatever their outcome.
    pub total_calls: u64,
    pub successes: u64,
    /// Errors and timeouts.
    pub failures: u64,
    /// Subset of `failures` that ran past the timeout.
    pub timeouts: u64,
    /// Calls refused without running.
    pub rejected: u64,
    /// `failures / total_calls`, or 0 with no calls.
    pub failure_rate: f64,
    /// Failures counting toward the threshold right now.
    pub current_failures: usize,
    /// Mean of the last 100 response times.
    pub avg_response_time: Option<Duration>,
    pub last_failure_time: Option<SystemTime>,
    pub uptime: Duration,
    pub time_in_state: Duration,
}

/// Proof that a call was admitted. Outcomes recorded against a permit from
/// an earlier generation update the counters but never move the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Permit {
    generation: u64,
    state: CircuitState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure,
    Timeout,
}

pub(crate) struct Circuit {
    name: String,
    thresholds: Thresholds,
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    /// Bumped on every transition and reset.
    generation: u64,
    last_state_change: Instant,
    opened_at: Option<Instant>,
    failures: usize,
    half_open_permits: usize,
    trial_successes: usize,
    last_failure_time: Option<SystemTime>,
    total_calls: u64,
    successes: u64,
    total_failures: u64,
    timeouts: u64,
    rejected: u64,
    response_times: RollingWindow,
    reset_at: Instant,
    pending: Vec<CircuitBreakerEvent>,
}

impl Circuit {
    pub(crate) fn new(name: String, thresholds: Thresholds, state_atomic: Arc<AtomicU8>) -> Self {
        let now = Instant::now();
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            name,
            thresholds,
            state: CircuitState::Closed,
            state_atomic,
            generation: 0,
            last_state_change: now,
            opened_at: None,
            failures: 0,
            half_open_permits: 0,
            trial_successes: 0,
            last_failure_time: None,
            total_calls: 0,
            successes: 0,
            total_failures: 0,
            timeouts: 0,
            rejected: 0,
            response_times: RollingWindow::new(RESPONSE_WINDOW),
            reset_at: now,
            pending: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.thresholds.timeout
    }

    /// Events produced since the last call, to be emitted once the lock is
    /// released.
    pub(crate) fn take_events(&mut self) -> Vec<CircuitBreakerEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Admits or refuses one call. `Err` carries the time left until a trial
    /// call will be admitted, when the circuit is open.
    pub(crate) fn try_acquire(&mut self) -> Result<Permit, Option<Duration>> {
        match self.state {
            CircuitState::Closed => Ok(self.permit()),
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed > self.thresholds.reset_timeout {
                    self.transition_to(CircuitState::HalfOpen);
                    self.half_open_permits = 1;
                    Ok(self.permit())
                } else {
                    self.reject();
                    Err(Some(self.thresholds.reset_timeout - elapsed))
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_permits < self.thresholds.half_open_max_calls {
                    self.half_open_permits += 1;
                    Ok(self.permit())
                } else {
                    self.reject();
                    Err(None)
                }
            }
        }
    }

    fn permit(&mut self) -> Permit {
        self.pending.push(CircuitBreakerEvent::CallPermitted {
            pattern_name: self.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });
        Permit {
            generation: self.generation,
            state: self.state,
        }
    }

    fn reject(&mut self) {
        self.rejected += 1;

        #[cfg(feature = "metrics")]
        counter!(
            "circuitbreaker_calls_total",
            "circuitbreaker" => self.name.clone(),
            "outcome" => "rejected"
        )
        .increment(1);

        self.pending.push(CircuitBreakerEvent::CallRejected {
            pattern_name: self.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });
    }

    /// Records how an admitted call settled.
    pub(crate) fn record(&mut self, permit: Permit, outcome: Outcome, duration: Duration) {
        self.total_calls += 1;
        self.response_times.push(duration);

        #[cfg(feature = "metrics")]
        histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => self.name.clone())
            .record(duration.as_secs_f64());

        let current = permit.generation == self.generation;

        match outcome {
            Outcome::Success => {
                self.successes += 1;

                #[cfg(feature = "metrics")]
                counter!(
                    "circuitbreaker_calls_total",
                    "circuitbreaker" => self.name.clone(),
                    "outcome" => "success"
                )
                .increment(1);

                self.pending.push(CircuitBreakerEvent::SuccessRecorded {
                    pattern_name: self.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state: self.state,
                    duration,
                });
                if current {
                    self.on_success();
                }
            }
            Outcome::Failure | Outcome::Timeout => {
                self.total_failures += 1;
                if outcome == Outcome::Timeout {
                    self.timeouts += 1;
                }
                self.last_failure_time = Some(SystemTime::now());

                #[cfg(feature = "metrics")]
                counter!(
                    "circuitbreaker_calls_total",
                    "circuitbreaker" => self.name.clone(),
                    "outcome" => "failure"
                )
                .increment(1);

                self.pending.push(CircuitBreakerEvent::FailureRecorded {
                    pattern_name: self.name.clone(),
                    timestamp: std::time::Instant::now(),
                    state: self.state,
                    duration,
                });
                if current {
                    self.on_failure();
                }
            }
        }
    }

    /// Gives back a half-open trial slot whose caller went away before the
    /// call settled.
    pub(crate) fn release(&mut self, permit: Permit) {
        if permit.generation == self.generation
            && permit.state == CircuitState::HalfOpen
            && self.half_open_permits > 0
        {
            self.half_open_permits -= 1;
        }
    }

    fn on_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                if self.thresholds.failure_count_policy == FailureCountPolicy::Consecutive {
                    self.failures = 0;
                }
            }
            CircuitState::HalfOpen => {
                self.trial_successes += 1;
                if self.trial_successes >= self.thresholds.half_open_max_calls {
                    self.transition_to(CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.failures += 1;
                if self.failures >= self.thresholds.failure_threshold {
                    self.transition_to(CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => self.transition_to(CircuitState::Open),
            CircuitState::Open => {}
        }
    }

    pub(crate) fn force_open(&mut self) {
        self.transition_to(CircuitState::Open);
        // restart the timer even when already open
        self.opened_at = Some(Instant::now());
    }

    pub(crate) fn force_closed(&mut self) {
        self.transition_to(CircuitState::Closed);
    }

    /// Closes the circuit and zeroes every counter.
    pub(crate) fn reset(&mut self) {
        self.transition_to(CircuitState::Closed);
        self.generation = self.generation.wrapping_add(1);
        self.failures = 0;
        self.last_failure_time = None;
        self.total_calls = 0;
        self.successes = 0;
        self.total_failures = 0;
        self.timeouts = 0;
        self.rejected = 0;
        self.response_times.clear();
        self.reset_at = Instant::now();
    }

    fn transition_to(&mut self, state: CircuitState) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        self.pending.push(CircuitBreakerEvent::StateTransition {
            pattern_name: self.name.clone(),
            timestamp: std::time::Instant::now(),
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(circuit = %self.name, from = ?from_state, to = ?state, "Circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => self.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "circuitbreaker" => self.name.clone())
                .set(state as u8 as f64);
        }

        let now = Instant::now();
        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.generation = self.generation.wrapping_add(1);
        self.last_state_change = now;
        self.opened_at = (state == CircuitState::Open).then_some(now);
        self.failures = 0;
        self.half_open_permits = 0;
        self.trial_successes = 0;
    }

    pub(crate) fn stats(&self) -> CircuitStats {
        CircuitStats {
            name: self.name.clone(),
            state: self.state,
            total_calls: self.total_calls,
            successes: self.successes,
            failures: self.total_failures,
            timeouts: self.timeouts,
            rejected: self.rejected,
            failure_rate: if self.total_calls > 0 {
                self.total_failures as f64 / self.total_calls as f64
            } else {
                0.0
            },
            current_failures: self.failures,
            avg_response_time: self.response_times.average(),
            last_failure_time: self.last_failure_time,
            uptime: self.reset_at.elapsed(),
            time_in_state: self.last_state_change.elapsed(),
        }
    }
}
