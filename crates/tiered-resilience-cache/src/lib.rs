//! Multi-tier caching with read-through backfill and best-effort write-through.
//!
//! A [`TieredCache`] holds an ordered list of [`Tier`]s, each wrapping a
//! [`CacheBackend`]. Lookups go fastest tier first. A hit in a slower tier is
//! returned immediately and copied into the faster tiers by a detached task.
//! Writes, deletes and clears fan out to every tier.
//!
//! Caching fails open: a tier that is down reads as a miss and swallows
//! writes, and nothing a tier does can fail the caller.
//!
//! ## Backends
//!
//! - [`MemoryBackend`]: bounded in-process LRU with per-entry TTL
//! - [`RemoteBackend`]: a distributed key-value store behind [`RemoteStore`]
//!   (redis via the `redis` feature, or [`InProcessStore`])
//! - [`ManagedBackend`]: placeholder for an unconfigured hosted cache
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tiered_resilience_cache::{InProcessStore, MemoryBackend, RemoteBackend, Tier, TieredCache};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let memory: MemoryBackend<u64> = MemoryBackend::builder()
//!     .max_entries(10_000)
//!     .default_ttl(Duration::from_secs(60))
//!     .build()?;
//! let remote: RemoteBackend<u64> = RemoteBackend::builder(Arc::new(InProcessStore::new()))
//!     .default_ttl(Duration::from_secs(300))
//!     .build()?;
//!
//! let cache = TieredCache::new(vec![Tier::new("memory", memory), Tier::new("remote", remote)])?;
//!
//! cache.set("balance:42", 1_250, None).await;
//! assert_eq!(cache.get("balance:42").await, Some(1_250));
//! # Ok(())
//! # }
//! ```

mod backend;
mod cache_metrics;
mod entry;
mod error;
mod managed;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;
mod remote;
mod tiered;

pub use backend::CacheBackend;
pub use cache_metrics::CacheMetrics;
pub use entry::{CacheEntry, CacheStats};
pub use error::CacheError;
pub use managed::ManagedBackend;
pub use memory::{MemoryBackend, MemoryBackendBuilder};
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;
pub use remote::{InProcessStore, RemoteBackend, RemoteBackendBuilder, RemoteStore};
pub use tiered::{Tier, TierStats, TieredCache, TieredStats};
