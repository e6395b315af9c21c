//! The capability every cache tier implements.

use crate::entry::CacheStats;
use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;

/// Uniform contract for a cache tier.
///
/// Implementations must treat their own unavailability as a miss or a
/// no-op: a network error while reading becomes `Ok(None)`, a failed write
/// is logged and dropped. `Err` is reserved for faults an implementation
/// chooses to surface to the orchestrator, which records them and carries
/// on with the next tier.
///
/// The trait is object safe; tiers are held as `Arc<dyn CacheBackend<V>>`.
#[async_trait]
pub trait CacheBackend<V>: Send + Sync {
    /// Looks up `key`. Missing, expired and stale-version entries are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    /// Stores `value`. `None` uses the backend's default TTL.
    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn clear_all(&self) -> Result<(), CacheError>;

    /// Removes every key starting with `prefix`. Backends without a way to
    /// enumerate keys log that they skipped the request and return `Ok(())`.
    async fn clear_by_prefix(&self, prefix: &str) -> Result<(), CacheError>;

    /// Health and size report. Never fails.
    async fn stats(&self) -> CacheStats;

    /// Short identifier used in logs and stats, e.g. `"memory"`.
    fn backend_type(&self) -> &'static str;
}
