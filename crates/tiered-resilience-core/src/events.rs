//! Event system shared by the admission-control primitives.
//!
//! Bulkheads and circuit breakers publish typed events through
//! [`EventListeners`]. Callbacks are registered at build time, usually via
//! the `on_*` helpers on each builder, and invoked synchronously after the
//! instance's lock has been released.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event published by a bulkhead or circuit breaker.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short machine-readable kind, e.g. `"state_transition"` or `"call_queued"`.
    fn event_type(&self) -> &'static str;

    fn timestamp(&self) -> Instant;

    /// Name of the bulkhead or breaker that emitted the event.
    fn pattern_name(&self) -> &str;
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Callbacks for one event type, run in registration order.
pub struct EventListeners<E> {
    callbacks: Vec<Callback<E>>,
}

impl<E: ResilienceEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    pub fn add<F>(&mut self, callback: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(callback));
    }

    /// Delivers `event` to every callback. A callback that panics is skipped
    /// and the rest still run.
    pub fn emit(&self, event: &E) {
        for callback in &self.callbacks {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(event)));
        }
    }
}

impl<E> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}
