//! Core infrastructure for tiered-resilience.
//!
//! This crate provides the pieces shared by the cache, bulkhead and circuit
//! breaker crates:
//! - Event system for observability
//! - The unified [`ResilienceError`] callers see at a gate
//! - [`ConfigError`], raised at construction time and never at call time
//! - [`RollingWindow`], the bounded sample window behind rolling averages

pub mod error;
pub mod events;
pub mod window;

pub use error::{ConfigError, ResilienceError};
pub use events::{EventListeners, ResilienceEvent};
pub use window::RollingWindow;
