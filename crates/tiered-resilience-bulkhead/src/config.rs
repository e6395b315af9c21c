//! Configuration for the bulkhead.

use crate::bulkhead::Bulkhead;
use crate::events::BulkheadEvent;
use std::time::Duration;
use tiered_resilience_core::{ConfigError, EventListeners};

/// The limits a bulkhead enforces. Adjustable at runtime through
/// [`Bulkhead::update_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Limits {
    pub(crate) max_concurrent: usize,
    pub(crate) queue_size: usize,
    pub(crate) timeout: Duration,
    pub(crate) priority_queueing: bool,
}

impl Limits {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        ConfigError::require_nonzero("bulkhead", "max_concurrent", self.max_concurrent as u128)?;
        ConfigError::require_nonzero("bulkhead", "timeout", self.timeout.as_millis())?;
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            queue_size: 100,
            timeout: Duration::from_secs(30),
            priority_queueing: false,
        }
    }
}

/// Validated bulkhead configuration.
#[derive(Clone)]
pub struct BulkheadConfig {
    pub(crate) limits: Limits,
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }
}

/// Builder for [`Bulkhead`].
pub struct BulkheadConfigBuilder {
    limits: Limits,
    name: String,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            limits: Limits::default(),
            name: "bulkhead".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets how many operations may run at once.
    ///
    /// Default: 10
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.limits.max_concurrent = max;
        self
    }

    /// Sets how many operations may wait for a slot. Zero disables queueing,
    /// so calls beyond `max_concurrent` are rejected immediately.
    ///
    /// Default: 100
    pub fn queue_size(mut self, size: usize) -> Self {
        self.limits.queue_size = size;
        self
    }

    /// Sets the deadline for an admitted operation. Time spent queued does
    /// not count against it.
    ///
    /// Default: 30 seconds
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    /// Orders the queue by priority (higher first, FIFO among equals)
    /// instead of plain arrival order.
    ///
    /// Default: false
    pub fn priority_queueing(mut self, enabled: bool) -> Self {
        self.limits.priority_queueing = enabled;
        self
    }

    /// Sets the name used in events, logs and metrics.
    ///
    /// Default: "bulkhead"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a call gets a slot.
    ///
    /// # Callback Signature
    /// `Fn(usize, Duration)` - active calls including this one, and how long
    /// the call waited in the queue (zero when admitted immediately).
    ///
    /// # Example
    /// ```rust
    /// use tiered_resilience_bulkhead::Bulkhead;
    ///
    /// let bulkhead = Bulkhead::builder()
    ///     .max_concurrent(8)
    ///     .on_call_permitted(|active, waited| {
    ///         if active >= 6 {
    ///             println!("near capacity ({active}/8), waited {waited:?}");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let BulkheadEvent::CallPermitted {
                concurrent_calls,
                waited,
                ..
            } = event
            {
                f(*concurrent_calls, *waited);
            }
        });
        self
    }

    /// Registers a callback when a call has to wait for a slot.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - queue depth after the call joined.
    pub fn on_call_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let BulkheadEvent::CallQueued { queue_depth, .. } = event {
                f(*queue_depth);
            }
        });
        self
    }

    /// Registers a callback when a call is shed because slots and queue are full.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - the configured `max_concurrent`.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let BulkheadEvent::CallRejected { max_concurrent, .. } = event {
                f(*max_concurrent);
            }
        });
        self
    }

    /// Registers a callback when an admitted call succeeds.
    pub fn on_call_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let BulkheadEvent::CallFinished { duration, .. } = event {
                f(*duration);
            }
        });
        self
    }

    /// Registers a callback when an admitted call returns an error.
    pub fn on_call_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let BulkheadEvent::CallFailed { duration, .. } = event {
                f(*duration);
            }
        });
        self
    }

    /// Registers a callback when an admitted call runs past the timeout.
    pub fn on_call_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(move |event| {
            if let BulkheadEvent::CallTimedOut { timeout, .. } = event {
                f(*timeout);
            }
        });
        self
    }

    /// Validates the configuration without building.
    pub fn into_config(self) -> Result<BulkheadConfig, ConfigError> {
        self.limits.validate()?;
        Ok(BulkheadConfig {
            limits: self.limits,
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }

    /// Builds the bulkhead.
    ///
    /// Fails if `max_concurrent` or `timeout` is zero.
    pub fn build(self) -> Result<Bulkhead, ConfigError> {
        self.into_config().map(Bulkhead::new)
    }
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A partial update for [`Bulkhead::update_config`]. `None` fields are left
/// unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkheadConfigUpdate {
    pub max_concurrent: Option<usize>,
    pub queue_size: Option<usize>,
    pub timeout: Option<Duration>,
    pub priority_queueing: Option<bool>,
}

impl BulkheadConfigUpdate {
    pub(crate) fn apply(&self, mut limits: Limits) -> Limits {
        if let Some(max) = self.max_concurrent {
            limits.max_concurrent = max;
        }
        if let Some(size) = self.queue_size {
            limits.queue_size = size;
        }
        if let Some(timeout) = self.timeout {
            limits.timeout = timeout;
        }
        if let Some(enabled) = self.priority_queueing {
            limits.priority_queueing = enabled;
        }
        limits
    }
}
