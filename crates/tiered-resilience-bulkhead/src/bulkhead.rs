//! Bounded-concurrency executor.

use crate::config::{BulkheadConfig, BulkheadConfigBuilder, BulkheadConfigUpdate, Limits};
use crate::error::BulkheadError;
use crate::events::BulkheadEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::{Duration, Instant};
use tiered_resilience_core::{ConfigError, EventListeners, RollingWindow};
use tokio::sync::oneshot;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// Samples kept for the execution and wait time averages.
const SAMPLE_WINDOW: usize = 1000;

/// Caps how many operations run at once, queues the overflow up to a
/// bound, and sheds the rest.
///
/// ```text
/// execute ─► slot free? ──yes──► run under timeout ─► release slot, admit queue head
///               │no
///               ▼
///          queue has room? ──yes──► wait (priority order or FIFO)
///               │no
///               ▼
///          BulkheadError::QueueFull
/// ```
///
/// # Timeouts
///
/// When an admitted operation runs past the timeout its future is dropped
/// and the caller gets [`BulkheadError::Timeout`]. Dropping stops the
/// operation at its next `.await`; work it already handed to another task
/// or to a remote system keeps going. Treat a timeout as "gave up waiting",
/// not as proof that nothing happened.
///
/// # Cancellation
///
/// Dropping the future returned by [`execute`](Self::execute) is safe at
/// any point: a queued call leaves the queue and a running call frees its
/// slot.
///
/// Clones share state.
#[derive(Clone)]
pub struct Bulkhead {
    shared: Arc<Shared>,
}

struct Shared {
    name: String,
    listeners: EventListeners<BulkheadEvent>,
    state: Mutex<State>,
}

struct State {
    limits: Limits,
    active: HashMap<u64, Instant>,
    queue: VecDeque<Waiter>,
    next_id: u64,
    completed: u64,
    failed: u64,
    timed_out: u64,
    rejected: u64,
    execution_times: RollingWindow,
    wait_times: RollingWindow,
    stats_since: Instant,
}

struct Waiter {
    id: u64,
    priority: i32,
    enqueued_at: Instant,
    admit: oneshot::Sender<Admission>,
}

enum Admission {
    Run { timeout: Duration },
    Cleared,
}

enum Entry {
    Run {
        id: u64,
        timeout: Duration,
        concurrent: usize,
    },
    Queued {
        id: u64,
        admission: oneshot::Receiver<Admission>,
        depth: usize,
    },
    Rejected {
        active: usize,
        max_concurrent: usize,
        queue_size: usize,
    },
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Success,
    Failure,
    Timeout,
}

/// A call admitted from the queue, reported after the lock is released.
struct Admitted {
    concurrent: usize,
    waited: Duration,
}

impl State {
    fn new(limits: Limits) -> Self {
        Self {
            limits,
            active: HashMap::new(),
            queue: VecDeque::new(),
            next_id: 0,
            completed: 0,
            failed: 0,
            timed_out: 0,
            rejected: 0,
            execution_times: RollingWindow::new(SAMPLE_WINDOW),
            wait_times: RollingWindow::new(SAMPLE_WINDOW),
            stats_since: Instant::now(),
        }
    }

    fn enter(&mut self, priority: i32) -> Entry {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        if self.active.len() < self.limits.max_concurrent {
            self.active.insert(id, Instant::now());
            self.wait_times.push(Duration::ZERO);
            return Entry::Run {
                id,
                timeout: self.limits.timeout,
                concurrent: self.active.len(),
            };
        }

        if self.queue.len() < self.limits.queue_size {
            let (tx, rx) = oneshot::channel();
            let position = if self.limits.priority_queueing {
                self.queue
                    .iter()
                    .position(|w| w.priority < priority)
                    .unwrap_or(self.queue.len())
            } else {
                self.queue.len()
            };
            self.queue.insert(
                position,
                Waiter {
                    id,
                    priority,
                    enqueued_at: Instant::now(),
                    admit: tx,
                },
            );
            return Entry::Queued {
                id,
                admission: rx,
                depth: self.queue.len(),
            };
        }

        self.rejected += 1;
        Entry::Rejected {
            active: self.active.len(),
            max_concurrent: self.limits.max_concurrent,
            queue_size: self.limits.queue_size,
        }
    }

    /// Admits queued calls while slots are free.
    fn drain(&mut self) -> Vec<Admitted> {
        let mut admitted = Vec::new();
        while self.active.len() < self.limits.max_concurrent {
            let Some(waiter) = self.queue.pop_front() else {
                break;
            };
            let now = Instant::now();
            self.active.insert(waiter.id, now);
            let run = Admission::Run {
                timeout: self.limits.timeout,
            };
            if waiter.admit.send(run).is_err() {
                // caller went away between queueing and admission
                self.active.remove(&waiter.id);
                continue;
            }
            let waited = now.duration_since(waiter.enqueued_at);
            self.wait_times.push(waited);
            admitted.push(Admitted {
                concurrent: self.active.len(),
                waited,
            });
        }
        admitted
    }

    fn record(&mut self, outcome: Outcome, elapsed: Duration) {
        self.execution_times.push(elapsed);
        match outcome {
            Outcome::Success => self.completed += 1,
            Outcome::Failure => self.failed += 1,
            Outcome::Timeout => {
                self.failed += 1;
                self.timed_out += 1;
            }
        }
    }
}

impl Shared {
    fn emit(&self, event: BulkheadEvent) {
        self.listeners.emit(&event);
    }

    fn announce_permitted(&self, concurrent: usize, waited: Duration) {
        #[cfg(feature = "tracing")]
        tracing::trace!(bulkhead = %self.name, concurrent, ?waited, "call permitted");

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_permitted_total", "bulkhead" => self.name.clone()).increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => self.name.clone()).set(concurrent as f64);
            histogram!("bulkhead_wait_duration_seconds", "bulkhead" => self.name.clone())
                .record(waited.as_secs_f64());
        }

        self.emit(BulkheadEvent::CallPermitted {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            concurrent_calls: concurrent,
            waited,
        });
    }

    fn announce_admitted(&self, admitted: Vec<Admitted>) {
        for a in admitted {
            self.announce_permitted(a.concurrent, a.waited);
        }
    }
}

/// Removes a waiter whose caller stopped waiting, or releases the slot it
/// was handed if admission raced with cancellation.
struct QueuedGuard<'a> {
    shared: &'a Shared,
    id: u64,
    armed: bool,
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let admitted = {
            let mut state = self.shared.state.lock();
            if let Some(pos) = state.queue.iter().position(|w| w.id == self.id) {
                state.queue.remove(pos);
                Vec::new()
            } else if state.active.remove(&self.id).is_some() {
                state.drain()
            } else {
                Vec::new()
            }
        };
        self.shared.announce_admitted(admitted);
    }
}

/// Holds a slot for the lifetime of a running operation.
struct ActiveGuard<'a> {
    shared: &'a Shared,
    id: u64,
    outcome: Option<(Outcome, Duration)>,
}

impl ActiveGuard<'_> {
    fn settle(mut self, outcome: Outcome, elapsed: Duration) {
        self.outcome = Some((outcome, elapsed));
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let (admitted, active) = {
            let mut state = self.shared.state.lock();
            state.active.remove(&self.id);
            if let Some((outcome, elapsed)) = self.outcome.take() {
                state.record(outcome, elapsed);
            }
            let admitted = state.drain();
            (admitted, state.active.len())
        };

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_concurrent_calls", "bulkhead" => self.shared.name.clone()).set(active as f64);
        #[cfg(not(feature = "metrics"))]
        let _ = active;

        self.shared.announce_admitted(admitted);
    }
}

impl Bulkhead {
    /// Returns a builder with default limits.
    pub fn builder() -> BulkheadConfigBuilder {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "bulkhead_calls_permitted_total",
                "Total number of calls given a bulkhead slot"
            );
            describe_counter!(
                "bulkhead_calls_queued_total",
                "Total number of calls that waited for a slot"
            );
            describe_counter!(
                "bulkhead_calls_rejected_total",
                "Total number of calls shed because slots and queue were full"
            );
            describe_counter!(
                "bulkhead_calls_finished_total",
                "Total number of admitted calls that succeeded"
            );
            describe_counter!(
                "bulkhead_calls_failed_total",
                "Total number of admitted calls that returned an error"
            );
            describe_counter!(
                "bulkhead_calls_timed_out_total",
                "Total number of admitted calls that ran past the timeout"
            );
            describe_gauge!("bulkhead_concurrent_calls", "Calls currently holding a slot");
            describe_gauge!("bulkhead_queue_depth", "Calls currently waiting for a slot");
            describe_histogram!(
                "bulkhead_wait_duration_seconds",
                "Time spent queued before getting a slot"
            );
            describe_histogram!(
                "bulkhead_call_duration_seconds",
                "Duration of admitted calls"
            );
        });
        BulkheadConfigBuilder::new()
    }

    pub(crate) fn new(config: BulkheadConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: config.name,
                listeners: config.event_listeners,
                state: Mutex::new(State::new(config.limits)),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Runs `operation` at default priority (0).
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BulkheadError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_priority(0, operation).await
    }

    /// Runs `operation` once a slot is free.
    ///
    /// `operation` is not invoked until the call is admitted, so a queued
    /// call holds no resources. With priority queueing enabled a higher
    /// `priority` is admitted first; equal priorities keep arrival order.
    /// Priority never preempts a call that is already running.
    pub async fn execute_with_priority<F, Fut, T, E>(
        &self,
        priority: i32,
        operation: F,
    ) -> Result<T, BulkheadError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let shared = &*self.shared;
        let entry = shared.state.lock().enter(priority);

        let (id, timeout) = match entry {
            Entry::Run {
                id,
                timeout,
                concurrent,
            } => {
                shared.announce_permitted(concurrent, Duration::ZERO);
                (id, timeout)
            }
            Entry::Queued {
                id,
                admission,
                depth,
            } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(bulkhead = %shared.name, depth, priority, "all slots busy, call queued");

                #[cfg(feature = "metrics")]
                {
                    counter!("bulkhead_calls_queued_total", "bulkhead" => shared.name.clone()).increment(1);
                    gauge!("bulkhead_queue_depth", "bulkhead" => shared.name.clone()).set(depth as f64);
                }

                shared.emit(BulkheadEvent::CallQueued {
                    pattern_name: shared.name.clone(),
                    timestamp: Instant::now(),
                    queue_depth: depth,
                    priority,
                });

                let mut waiting = QueuedGuard {
                    shared,
                    id,
                    armed: true,
                };
                let admission = admission.await;
                waiting.armed = false;

                match admission {
                    Ok(Admission::Run { timeout }) => (id, timeout),
                    Ok(Admission::Cleared) | Err(_) => {
                        return Err(BulkheadError::QueueCleared {
                            name: shared.name.clone(),
                        });
                    }
                }
            }
            Entry::Rejected {
                active,
                max_concurrent,
                queue_size,
            } => {
                #[cfg(feature = "tracing")]
                tracing::warn!(bulkhead = %shared.name, active, queue_size, "bulkhead full, call rejected");

                #[cfg(feature = "metrics")]
                counter!("bulkhead_calls_rejected_total", "bulkhead" => shared.name.clone()).increment(1);

                shared.emit(BulkheadEvent::CallRejected {
                    pattern_name: shared.name.clone(),
                    timestamp: Instant::now(),
                    max_concurrent,
                    queue_size,
                });
                return Err(BulkheadError::QueueFull {
                    name: shared.name.clone(),
                    active,
                    queue_size,
                });
            }
        };

        let running = ActiveGuard {
            shared,
            id,
            outcome: None,
        };
        let started = Instant::now();
        let result = tokio::time::timeout(timeout, operation()).await;
        let elapsed = started.elapsed();

        #[cfg(feature = "metrics")]
        histogram!("bulkhead_call_duration_seconds", "bulkhead" => shared.name.clone())
            .record(elapsed.as_secs_f64());

        match result {
            Ok(Ok(value)) => {
                running.settle(Outcome::Success, elapsed);

                #[cfg(feature = "metrics")]
                counter!("bulkhead_calls_finished_total", "bulkhead" => shared.name.clone()).increment(1);

                shared.emit(BulkheadEvent::CallFinished {
                    pattern_name: shared.name.clone(),
                    timestamp: Instant::now(),
                    duration: elapsed,
                });
                Ok(value)
            }
            Ok(Err(err)) => {
                running.settle(Outcome::Failure, elapsed);

                #[cfg(feature = "metrics")]
                counter!("bulkhead_calls_failed_total", "bulkhead" => shared.name.clone()).increment(1);

                shared.emit(BulkheadEvent::CallFailed {
                    pattern_name: shared.name.clone(),
                    timestamp: Instant::now(),
                    duration: elapsed,
                });
                Err(BulkheadError::Inner(err))
            }
            Err(_) => {
                running.settle(Outcome::Timeout, elapsed);

                #[cfg(feature = "tracing")]
                tracing::warn!(bulkhead = %shared.name, ?timeout, "operation timed out; future dropped");

                #[cfg(feature = "metrics")]
                counter!("bulkhead_calls_timed_out_total", "bulkhead" => shared.name.clone()).increment(1);

                shared.emit(BulkheadEvent::CallTimedOut {
                    pattern_name: shared.name.clone(),
                    timestamp: Instant::now(),
                    timeout,
                });
                Err(BulkheadError::Timeout { timeout })
            }
        }
    }

    /// Timeout applied to calls admitted from now on.
    pub fn timeout(&self) -> Duration {
        self.shared.state.lock().limits.timeout
    }

    /// Counters, rolling averages and derived rates.
    pub fn stats(&self) -> BulkheadStats {
        let state = self.shared.state.lock();
        let since_reset = state.stats_since.elapsed();
        let secs = since_reset.as_secs_f64();
        BulkheadStats {
            name: self.shared.name.clone(),
            active: state.active.len(),
            queued: state.queue.len(),
            max_concurrent: state.limits.max_concurrent,
            queue_size: state.limits.queue_size,
            completed: state.completed,
            failed: state.failed,
            timed_out: state.timed_out,
            rejected: state.rejected,
            avg_execution_time: state.execution_times.average(),
            avg_wait_time: state.wait_times.average(),
            throughput: if secs > 0.0 {
                state.completed as f64 / secs
            } else {
                0.0
            },
            utilization: state.active.len() as f64 / state.limits.max_concurrent as f64,
            since_reset,
        }
    }

    /// What is waiting, in admission order.
    pub fn queue_status(&self) -> QueueStatus {
        let state = self.shared.state.lock();
        let now = Instant::now();
        QueueStatus {
            queued: state.queue.len(),
            queue_size: state.limits.queue_size,
            priority_queueing: state.limits.priority_queueing,
            waiting: state
                .queue
                .iter()
                .map(|w| QueuedCall {
                    id: w.id,
                    priority: w.priority,
                    waited: now.duration_since(w.enqueued_at),
                })
                .collect(),
        }
    }

    /// Fails every queued call with [`BulkheadError::QueueCleared`] and
    /// returns how many there were. Running calls are untouched.
    pub fn clear_queue(&self) -> usize {
        let waiters: Vec<Waiter> = self.shared.state.lock().queue.drain(..).collect();
        let cleared = waiters.len();
        for waiter in waiters {
            let _ = waiter.admit.send(Admission::Cleared);
        }

        #[cfg(feature = "tracing")]
        tracing::info!(bulkhead = %self.shared.name, cleared, "bulkhead queue cleared");

        #[cfg(feature = "metrics")]
        gauge!("bulkhead_queue_depth", "bulkhead" => self.shared.name.clone()).set(0.0);

        self.shared.emit(BulkheadEvent::QueueCleared {
            pattern_name: self.shared.name.clone(),
            timestamp: Instant::now(),
            cleared,
        });
        cleared
    }

    /// Zeroes counters and sample windows and restarts the throughput clock.
    pub fn reset_stats(&self) {
        let mut state = self.shared.state.lock();
        state.completed = 0;
        state.failed = 0;
        state.timed_out = 0;
        state.rejected = 0;
        state.execution_times.clear();
        state.wait_times.clear();
        state.stats_since = Instant::now();
    }

    /// Changes limits at runtime.
    ///
    /// The merged limits are validated first; on error nothing changes.
    /// Raising `max_concurrent` admits queued calls straight away. Lowering
    /// it or `queue_size` never evicts running or queued calls; the new
    /// bounds apply as they drain.
    pub fn update_config(&self, update: BulkheadConfigUpdate) -> Result<(), ConfigError> {
        let admitted = {
            let mut state = self.shared.state.lock();
            let limits = update.apply(state.limits);
            limits.validate()?;
            state.limits = limits;
            state.drain()
        };

        #[cfg(feature = "tracing")]
        tracing::info!(bulkhead = %self.shared.name, ?update, "bulkhead limits updated");

        self.shared.announce_admitted(admitted);
        Ok(())
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Bulkhead")
            .field("name", &self.shared.name)
            .field("limits", &state.limits)
            .field("active", &state.active.len())
            .field("queued", &state.queue.len())
            .finish()
    }
}

/// Snapshot returned by [`Bulkhead::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkheadStats {
    pub name: String,
    pub active: usize,
    pub queued: usize,
    pub max_concurrent: usize,
    pub queue_size: usize,
    /// Admitted calls that succeeded.
    pub completed: u64,
    /// Admitted calls that errored or timed out.
    pub failed: u64,
    /// Subset of `failed` that ran past the timeout.
    pub timed_out: u64,
    /// Calls shed with `QueueFull`.
    pub rejected: u64,
    /// Mean over the last 1000 settled calls.
    pub avg_execution_time: Option<Duration>,
    /// Mean over the last 1000 admissions.
    pub avg_wait_time: Option<Duration>,
    /// Completed calls per second since the last reset.
    pub throughput: f64,
    /// `active / max_concurrent`.
    pub utilization: f64,
    pub since_reset: Duration,
}

/// Snapshot returned by [`Bulkhead::queue_status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub queue_size: usize,
    pub priority_queueing: bool,
    /// Queued calls, head first.
    pub waiting: Vec<QueuedCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedCall {
    pub id: u64,
    pub priority: i32,
    pub waited: Duration,
}
