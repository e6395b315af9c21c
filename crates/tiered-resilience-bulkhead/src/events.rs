//! Events emitted by a bulkhead.

use std::time::{Duration, Instant};
use tiered_resilience_core::ResilienceEvent;

#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call got a slot, either immediately or after waiting in the queue.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        /// Active calls including this one.
        concurrent_calls: usize,
        waited: Duration,
    },
    /// All slots were busy; the call joined the queue.
    CallQueued {
        pattern_name: String,
        timestamp: Instant,
        queue_depth: usize,
        priority: i32,
    },
    /// Slots and queue were both full.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        max_concurrent: usize,
        queue_size: usize,
    },
    CallFinished {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    CallFailed {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
    CallTimedOut {
        pattern_name: String,
        timestamp: Instant,
        timeout: Duration,
    },
    /// An operator emptied the queue.
    QueueCleared {
        pattern_name: String,
        timestamp: Instant,
        cleared: usize,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallFinished { .. } => "call_finished",
            BulkheadEvent::CallFailed { .. } => "call_failed",
            BulkheadEvent::CallTimedOut { .. } => "call_timed_out",
            BulkheadEvent::QueueCleared { .. } => "queue_cleared",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallQueued { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallFinished { timestamp, .. }
            | BulkheadEvent::CallFailed { timestamp, .. }
            | BulkheadEvent::CallTimedOut { timestamp, .. }
            | BulkheadEvent::QueueCleared { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { pattern_name, .. }
            | BulkheadEvent::CallQueued { pattern_name, .. }
            | BulkheadEvent::CallRejected { pattern_name, .. }
            | BulkheadEvent::CallFinished { pattern_name, .. }
            | BulkheadEvent::CallFailed { pattern_name, .. }
            | BulkheadEvent::CallTimedOut { pattern_name, .. }
            | BulkheadEvent::QueueCleared { pattern_name, .. } => pattern_name,
        }
    }
}
