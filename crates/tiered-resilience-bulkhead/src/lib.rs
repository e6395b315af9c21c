//! Bounded-concurrency executor for protecting a subsystem from overload.
//!
//! A [`Bulkhead`] lets at most `max_concurrent` operations run at once.
//! Further calls wait in a bounded queue, optionally ordered by priority, and
//! calls that find the queue full are rejected straight away. Every admitted
//! operation runs under a timeout.
//!
//! # Basic Example
//!
//! ```rust
//! use tiered_resilience_bulkhead::Bulkhead;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let bulkhead = Bulkhead::builder()
//!     .name("payments")
//!     .max_concurrent(10)
//!     .queue_size(50)
//!     .timeout(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//!
//! let total = bulkhead
//!     .execute(|| async { Ok::<_, std::io::Error>(42) })
//!     .await
//!     .unwrap();
//! assert_eq!(total, 42);
//! # }
//! ```
//!
//! # Priorities
//!
//! With `priority_queueing(true)`, [`Bulkhead::execute_with_priority`]
//! inserts a queued call ahead of every call with strictly lower priority,
//! so equal priorities stay FIFO:
//!
//! ```rust
//! use tiered_resilience_bulkhead::Bulkhead;
//!
//! # async fn example() {
//! let bulkhead = Bulkhead::builder()
//!     .max_concurrent(2)
//!     .priority_queueing(true)
//!     .build()
//!     .unwrap();
//!
//! let _ = bulkhead
//!     .execute_with_priority(10, || async { Ok::<_, ()>("urgent") })
//!     .await;
//! # }
//! ```
//!
//! # Runtime control
//!
//! [`Bulkhead::stats`], [`Bulkhead::queue_status`], [`Bulkhead::clear_queue`],
//! [`Bulkhead::reset_stats`] and [`Bulkhead::update_config`] let operators
//! inspect and adjust a live instance.
//!
//! # Tower
//!
//! ```rust
//! use tiered_resilience_bulkhead::{Bulkhead, BulkheadLayer};
//! use tower::ServiceBuilder;
//!
//! # async fn example() {
//! let bulkhead = Bulkhead::builder().max_concurrent(4).build().unwrap();
//! let service = ServiceBuilder::new()
//!     .layer(BulkheadLayer::new(bulkhead))
//!     .service_fn(|req: String| async move { Ok::<_, ()>(req) });
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `tracing`: log admissions, rejections and timeouts
//! - `metrics`: export counters, gauges and histograms via the `metrics` crate

mod bulkhead;
mod config;
mod error;
mod events;
mod layer;

pub use bulkhead::{Bulkhead, BulkheadStats, QueueStatus, QueuedCall};
pub use config::{BulkheadConfig, BulkheadConfigBuilder, BulkheadConfigUpdate};
pub use error::BulkheadError;
pub use events::BulkheadEvent;
pub use layer::{BulkheadLayer, BulkheadService};
