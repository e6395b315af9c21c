//! Tiered caching and per-subsystem admission control.
//!
//! `tiered-resilience` ties together the pattern crates:
//!
//! - **Cache** ([`cache`]): ordered tiers with read-through backfill and
//!   best-effort write-through
//! - **Bulkhead** ([`bulkhead`]): bounded concurrency with a priority queue
//! - **Circuit Breaker** ([`circuitbreaker`]): fail fast while a dependency
//!   is down
//!
//! and adds the glue a service needs to use them per subsystem:
//! [`ResilienceRegistry`] hands out one bulkhead and breaker per name,
//! [`Gate`] runs calls through both, and [`GatedCache`] puts a gate in
//! front of a cache's fill path. [`ResilienceSettings`] loads everything
//! from defaults, a TOML file and the environment.
//!
//! # Example
//!
//! ```rust
//! use tiered_resilience::{
//!     build_tiered_cache, GatedCache, ResilienceRegistry, ResilienceSettings,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ResilienceSettings::from_toml(
//!     r#"
//!     [bulkheads.finance]
//!     max_concurrent = 4
//!     "#,
//! )?;
//! let registry = ResilienceRegistry::new(settings.clone())?;
//!
//! let cache = build_tiered_cache::<u64>(&settings.cache, None)?;
//! let balances = GatedCache::new(cache, registry.gate("finance")?);
//!
//! let balance = balances
//!     .get_or_compute("balance:42", None, || async {
//!         Ok::<_, std::io::Error>(1_250)
//!     })
//!     .await?;
//! assert_eq!(balance, 1_250);
//! # Ok(())
//! # }
//! ```

mod gate;
mod registry;
mod settings;
mod tiers;

pub use gate::{Gate, GatedCache};
pub use registry::{RegistrySnapshot, ResilienceRegistry};
pub use settings::{
    BulkheadOverride, BulkheadSettings, CacheSettings, CircuitBreakerOverride,
    CircuitBreakerSettings, ResilienceSettings, TierKind, TierSettings, DEFAULT_CONFIG_FILE,
    ENV_PREFIX,
};
pub use tiers::build_tiered_cache;

pub use tiered_resilience_core::{ConfigError, ResilienceError};

pub use tiered_resilience_bulkhead as bulkhead;
pub use tiered_resilience_cache as cache;
pub use tiered_resilience_circuitbreaker as circuitbreaker;
