//! Error types for the bulkhead.

use std::time::Duration;
use tiered_resilience_core::ResilienceError;

/// Why a call through a bulkhead did not produce the operation's value.
#[derive(Debug, thiserror::Error)]
pub enum BulkheadError<E> {
    /// Every slot is busy and the wait queue is full. This is load shedding:
    /// back off or drop the work rather than retrying immediately.
    #[error("bulkhead '{name}' is full: {active} active, queue of {queue_size} full")]
    QueueFull {
        name: String,
        active: usize,
        queue_size: usize,
    },

    /// The operation was admitted but did not settle within the deadline.
    #[error("operation exceeded bulkhead timeout of {timeout:?}")]
    Timeout { timeout: Duration },

    /// The call was still queued when the queue was cleared.
    #[error("queued call was cleared from bulkhead '{name}'")]
    QueueCleared { name: String },

    /// The operation itself failed.
    #[error("operation failed: {0}")]
    Inner(E),
}

impl<E> BulkheadError<E> {
    pub fn is_queue_full(&self) -> bool {
        matches!(self, BulkheadError::QueueFull { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BulkheadError::Timeout { .. })
    }

    pub fn is_queue_cleared(&self) -> bool {
        matches!(self, BulkheadError::QueueCleared { .. })
    }

    /// Returns the operation's own error, if that is what this is.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BulkheadError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<BulkheadError<E>> for ResilienceError<E> {
    fn from(err: BulkheadError<E>) -> Self {
        match err {
            BulkheadError::QueueFull {
                active, queue_size, ..
            } => ResilienceError::QueueFull { active, queue_size },
            BulkheadError::Timeout { .. } => ResilienceError::Timeout { layer: "bulkhead" },
            BulkheadError::QueueCleared { .. } => ResilienceError::QueueCleared,
            BulkheadError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
