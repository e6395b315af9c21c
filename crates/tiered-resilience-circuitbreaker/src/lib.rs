//! Circuit breaker for async operations.
//!
//! A [`CircuitBreaker`] stops calling a dependency that keeps failing, then
//! probes it with a few trial calls before letting traffic back through.
//!
//! ## Basic Usage
//!
//! ```rust
//! use tiered_resilience_circuitbreaker::{CircuitBreaker, CircuitState};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::builder()
//!     .name("ledger")
//!     .failure_threshold(5)
//!     .reset_timeout(Duration::from_secs(30))
//!     .half_open_max_calls(2)
//!     .timeout(Duration::from_secs(3))
//!     .build()
//!     .unwrap();
//!
//! let _balance = breaker
//!     .execute(|| async { Ok::<_, std::io::Error>(1_250u64) })
//!     .await;
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # }
//! ```
//!
//! ## Failure counting
//!
//! By default every failure since the circuit last closed counts toward
//! `failure_threshold`. With [`FailureCountPolicy::Consecutive`] a success
//! clears the count. Timeouts always count as failures.
//!
//! ## Operator actions
//!
//! [`CircuitBreaker::reset`], [`CircuitBreaker::force_open`] and
//! [`CircuitBreaker::force_closed`] bypass the normal transitions for
//! incident response.
//!
//! ```rust
//! use tiered_resilience_circuitbreaker::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::builder().build().unwrap();
//! breaker.force_open();
//! assert_eq!(breaker.http_status(), 503);
//! breaker.reset();
//! assert_eq!(breaker.health_status(), "healthy");
//! ```
//!
//! ## Features
//! - `tracing`: log state transitions, rejections and timeouts
//! - `metrics`: export call counts, transitions and latency histograms

mod breaker;
mod circuit;
mod config;
mod error;
mod events;
mod layer;

pub use breaker::CircuitBreaker;
pub use circuit::{CircuitState, CircuitStats};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, FailureCountPolicy};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};
