//! Bulkhead plus circuit breaker around one subsystem's calls.

use std::future::Future;
use std::time::Duration;
use tiered_resilience_bulkhead::{Bulkhead, BulkheadError};
use tiered_resilience_cache::TieredCache;
use tiered_resilience_circuitbreaker::{CircuitBreaker, CircuitBreakerError};
use tiered_resilience_core::ResilienceError;
use tokio::time::Instant;

/// Admission control for one subsystem.
///
/// A call first takes a bulkhead slot, then asks the breaker. The breaker
/// only sees calls that were admitted, so load shedding never opens the
/// circuit, and a call rejected by an open circuit gives its slot straight
/// back.
///
/// The bulkhead's timeout is enforced inside the breaker, so a call that
/// outlives it counts as a breaker failure whichever of the two timeouts is
/// shorter. The bulkhead then records it as failed rather than timed out.
#[derive(Clone, Debug)]
pub struct Gate {
    name: String,
    bulkhead: Bulkhead,
    breaker: CircuitBreaker,
}

impl Gate {
    pub fn new(name: impl Into<String>, bulkhead: Bulkhead, breaker: CircuitBreaker) -> Self {
        Self {
            name: name.into(),
            bulkhead,
            breaker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bulkhead(&self) -> &Bulkhead {
        &self.bulkhead
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Runs `operation` at default priority.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with_priority(0, operation).await
    }

    /// Runs `operation` through the bulkhead at `priority`, then through the
    /// breaker.
    pub async fn call_with_priority<F, Fut, T, E>(
        &self,
        priority: i32,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let breaker = &self.breaker;
        let bulkhead = &self.bulkhead;
        self.bulkhead
            .execute_with_priority(priority, || {
                // taken before the bulkhead arms its own timer, so this
                // deadline never falls after it
                let deadline = Instant::now().checked_add(bulkhead.timeout());
                breaker.execute(move || async move {
                    let outcome = match deadline {
                        Some(deadline) => tokio::time::timeout_at(deadline, operation()).await,
                        None => Ok(operation().await),
                    };
                    match outcome {
                        Ok(result) => result.map_err(Attempt::Failed),
                        Err(_) => Err(Attempt::PastDeadline),
                    }
                })
            })
            .await
            .map_err(flatten)
    }
}

/// What the breaker sees as the operation's error.
enum Attempt<E> {
    Failed(E),
    PastDeadline,
}

fn flatten<E>(err: BulkheadError<CircuitBreakerError<Attempt<E>>>) -> ResilienceError<E> {
    match err {
        BulkheadError::Inner(CircuitBreakerError::Inner(Attempt::Failed(e))) => {
            ResilienceError::Application(e)
        }
        BulkheadError::Inner(CircuitBreakerError::Inner(Attempt::PastDeadline))
        | BulkheadError::Timeout { .. } => ResilienceError::Timeout { layer: "bulkhead" },
        BulkheadError::Inner(CircuitBreakerError::OpenCircuit { name, retry_after }) => {
            ResilienceError::CircuitOpen { name, retry_after }
        }
        BulkheadError::Inner(CircuitBreakerError::Timeout { .. }) => ResilienceError::Timeout {
            layer: "circuit_breaker",
        },
        BulkheadError::QueueFull {
            active, queue_size, ..
        } => ResilienceError::QueueFull { active, queue_size },
        BulkheadError::QueueCleared { .. } => ResilienceError::QueueCleared,
    }
}

/// A [`TieredCache`] whose fill path runs through a [`Gate`].
///
/// Cache faults never surface: a broken tier reads as a miss. Only the
/// compute path can fail, and then with the gate's [`ResilienceError`].
#[derive(Clone)]
pub struct GatedCache<V> {
    cache: TieredCache<V>,
    gate: Gate,
}

impl<V> GatedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(cache: TieredCache<V>, gate: Gate) -> Self {
        Self { cache, gate }
    }

    pub fn cache(&self) -> &TieredCache<V> {
        &self.cache
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Reads through the tiers; on a miss, runs `compute` through the gate
    /// and writes the result to every tier.
    ///
    /// Nothing is cached when `compute` fails or is not admitted.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.cache.get(key).await {
            return Ok(value);
        }
        let value = self.gate.call(compute).await?;
        self.cache.set(key, value.clone(), ttl).await;
        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.delete(key).await;
    }

    pub async fn invalidate_prefix(&self, prefix: &str) {
        self.cache.clear_by_prefix(prefix).await;
    }
}

impl<V> std::fmt::Debug for GatedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatedCache")
            .field("gate", &self.gate)
            .field("tiers", &self.cache.tiers().len())
            .finish()
    }
}
