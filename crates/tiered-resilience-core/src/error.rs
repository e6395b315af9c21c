//! Error types shared across the workspace.
//!
//! [`ResilienceError`] is what a caller sees after routing work through a
//! bulkhead and circuit breaker. Each pattern crate converts its own error
//! into it with a `From` impl, so a gate can use `?` on both layers without
//! any hand-written conversions.
//!
//! ```rust
//! use tiered_resilience_core::ResilienceError;
//!
//! #[derive(Debug)]
//! struct LedgerDown;
//!
//! impl std::fmt::Display for LedgerDown {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "ledger store unavailable")
//!     }
//! }
//!
//! fn respond(err: ResilienceError<LedgerDown>) -> u16 {
//!     match err {
//!         ResilienceError::QueueFull { .. } | ResilienceError::CircuitOpen { .. } => 503,
//!         ResilienceError::Timeout { .. } => 504,
//!         ResilienceError::QueueCleared => 503,
//!         ResilienceError::Application(_) => 500,
//!     }
//! }
//!
//! assert_eq!(respond(ResilienceError::Timeout { layer: "bulkhead" }), 504);
//! ```

use std::fmt;
use std::time::Duration;

/// Unified admission-control error wrapping the operation's own error `E`.
#[derive(Debug, Clone)]
pub enum ResilienceError<E> {
    /// The operation did not settle within the layer's deadline.
    Timeout {
        /// `"bulkhead"` or `"circuit_breaker"`.
        layer: &'static str,
    },

    /// The breaker is open; the operation was not invoked.
    CircuitOpen {
        /// Breaker name.
        name: String,
        /// Time left until the breaker will admit a trial call.
        retry_after: Option<Duration>,
    },

    /// Both the active set and the wait queue are full. Treat as backpressure.
    QueueFull {
        /// Tasks running when the call was rejected.
        active: usize,
        /// Configured queue capacity.
        queue_size: usize,
    },

    /// The call was waiting in a bulkhead queue when an operator cleared it.
    QueueCleared,

    /// The operation itself failed.
    Application(E),
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::Timeout { layer } => write!(f, "timeout in {}", layer),
            ResilienceError::CircuitOpen { name, retry_after } => match retry_after {
                Some(d) => write!(f, "circuit '{}' is open, retry after {:?}", name, d),
                None => write!(f, "circuit '{}' is open", name),
            },
            ResilienceError::QueueFull { active, queue_size } => write!(
                f,
                "service busy: {} active and queue of {} full",
                active, queue_size
            ),
            ResilienceError::QueueCleared => write!(f, "queued call was cleared"),
            ResilienceError::Application(e) => write!(f, "application error: {}", e),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E> where E: std::error::Error {}

impl<E> ResilienceError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::Timeout { .. })
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_queue_full(&self) -> bool {
        matches!(self, ResilienceError::QueueFull { .. })
    }

    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    /// Returns `true` for the "service busy" class: a full queue, an open
    /// circuit or a cleared queue. None of these should be retried in a loop.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ResilienceError::QueueFull { .. }
                | ResilienceError::CircuitOpen { .. }
                | ResilienceError::QueueCleared
        )
    }

    /// Extracts the application error, if this is an `Application` variant.
    pub fn application_error(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the application error, leaving admission-control variants intact.
    pub fn map_application<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::Timeout { layer } => ResilienceError::Timeout { layer },
            ResilienceError::CircuitOpen { name, retry_after } => {
                ResilienceError::CircuitOpen { name, retry_after }
            }
            ResilienceError::QueueFull { active, queue_size } => {
                ResilienceError::QueueFull { active, queue_size }
            }
            ResilienceError::QueueCleared => ResilienceError::QueueCleared,
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}

/// Invalid configuration, detected while constructing an instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("invalid {pattern} configuration: {field} {reason}")]
    Invalid {
        /// `"bulkhead"`, `"circuit_breaker"`, `"cache"`...
        pattern: &'static str,
        field: &'static str,
        reason: String,
    },

    /// A tiered cache needs at least one tier.
    #[error("a tiered cache requires at least one tier")]
    NoTiers,

    /// A remote tier was configured but no remote store was supplied.
    #[error("tier '{tier}' is remote but no remote store was provided")]
    MissingRemoteStore { tier: String },

    /// Settings could not be loaded or parsed.
    #[error("failed to load settings: {0}")]
    Load(String),
}

impl ConfigError {
    pub fn invalid(pattern: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            pattern,
            field,
            reason: reason.into(),
        }
    }

    /// Fails with [`ConfigError::Invalid`] when `value` is zero.
    pub fn require_nonzero(
        pattern: &'static str,
        field: &'static str,
        value: u128,
    ) -> Result<(), ConfigError> {
        if value == 0 {
            Err(Self::invalid(pattern, field, "must be greater than zero"))
        } else {
            Ok(())
        }
    }
}
