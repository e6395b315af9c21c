//! Read-through, write-through orchestration over ordered tiers.

use crate::backend::CacheBackend;
use crate::cache_metrics::CacheMetrics;
use crate::entry::CacheStats;
use futures::future::join_all;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::{Duration, Instant, SystemTime};
use tiered_resilience_core::ConfigError;
use tracing::{debug, trace, warn};

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// One named cache tier.
pub struct Tier<V> {
    name: String,
    backend: Arc<dyn CacheBackend<V>>,
}

impl<V: Send + Sync + 'static> Tier<V> {
    pub fn new<B>(name: impl Into<String>, backend: B) -> Self
    where
        B: CacheBackend<V> + 'static,
    {
        Self::shared(name, Arc::new(backend))
    }

    /// Builds a tier around a backend the caller keeps a handle to.
    pub fn shared(name: impl Into<String>, backend: Arc<dyn CacheBackend<V>>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend<V>> {
        &self.backend
    }
}

impl<V> Clone for Tier<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            backend: Arc::clone(&self.backend),
        }
    }
}

/// Aggregated view over every tier's [`CacheStats`].
#[derive(Debug, Clone, Serialize)]
pub struct TieredStats {
    /// `true` only if every tier reports itself available.
    pub available: bool,
    /// Sum over the tiers that report a count; `None` if none do.
    pub entry_count: Option<u64>,
    /// Per-tier stats in tier order.
    pub tiers: Vec<TierStats>,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub name: String,
    pub stats: CacheStats,
}

/// A cache consulted tier by tier, fastest first.
///
/// - `get` returns the first hit. A hit below tier 0 is copied into the
///   faster tiers by a detached task, so the caller only pays for the tier
///   that answered. A tier returning `Err` is counted and skipped.
/// - `set`, `delete` and the clears run against every tier concurrently
///   and resolve once all of them have settled. Individual tier failures
///   are logged; they never fail the call.
///
/// The tier list is fixed at construction. Cloning is cheap and clones
/// share tiers and metrics.
pub struct TieredCache<V> {
    tiers: Arc<[Tier<V>]>,
    metrics: Arc<Mutex<CacheMetrics>>,
}

impl<V> Clone for TieredCache<V> {
    fn clone(&self) -> Self {
        Self {
            tiers: Arc::clone(&self.tiers),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Builds a cache over `tiers`, index 0 being checked first.
    ///
    /// An empty tier list is rejected here rather than on first use.
    pub fn new(tiers: Vec<Tier<V>>) -> Result<Self, ConfigError> {
        if tiers.is_empty() {
            return Err(ConfigError::NoTiers);
        }

        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!("cache_lookups_total", "Tiered cache lookups by outcome");
            describe_counter!(
                "cache_tier_errors_total",
                "Unexpected errors returned by a cache tier during lookup"
            );
            describe_histogram!(
                "cache_lookup_duration_seconds",
                "Time to find a value in the tier that answered"
            );
        });

        debug!(
            tiers = ?tiers.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "tiered cache constructed"
        );

        Ok(Self {
            tiers: tiers.into(),
            metrics: Arc::new(Mutex::new(CacheMetrics::default())),
        })
    }

    pub fn tiers(&self) -> &[Tier<V>] {
        &self.tiers
    }

    /// Looks `key` up tier by tier and returns the first hit.
    pub async fn get(&self, key: &str) -> Option<V> {
        let start = Instant::now();

        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.backend.get(key).await {
                Ok(Some(value)) => {
                    let elapsed = start.elapsed();
                    self.metrics
                        .lock()
                        .record_hit(&tier.name, elapsed.as_secs_f64() * 1_000.0);

                    #[cfg(feature = "metrics")]
                    {
                        counter!("cache_lookups_total", "outcome" => "hit", "tier" => tier.name.clone())
                            .increment(1);
                        histogram!("cache_lookup_duration_seconds", "tier" => tier.name.clone())
                            .record(elapsed.as_secs_f64());
                    }

                    trace!(key, tier = %tier.name, "cache hit");
                    if index > 0 {
                        self.spawn_backfill(key, &value, index);
                    }
                    return Some(value);
                }
                Ok(None) => {}
                Err(err) => {
                    self.metrics.lock().record_error();

                    #[cfg(feature = "metrics")]
                    counter!("cache_tier_errors_total", "tier" => tier.name.clone()).increment(1);

                    warn!(key, tier = %tier.name, error = %err, "cache tier failed during lookup; trying next tier");
                }
            }
        }

        self.metrics.lock().record_miss();

        #[cfg(feature = "metrics")]
        counter!("cache_lookups_total", "outcome" => "miss").increment(1);

        trace!(key, "cache miss in every tier");
        None
    }

    /// Copies a value found in tier `hit_index` into tiers `0..hit_index`
    /// without holding up the caller.
    fn spawn_backfill(&self, key: &str, value: &V, hit_index: usize) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(key, "no tokio runtime available; backfill skipped");
                return;
            }
        };

        let faster: Vec<Tier<V>> = self.tiers[..hit_index].to_vec();
        let key = key.to_string();
        let value = value.clone();

        handle.spawn(async move {
            let writes = faster.iter().map(|tier| {
                let value = value.clone();
                let key = key.as_str();
                async move { (tier, tier.backend.set(key, value, None).await) }
            });
            for (tier, result) in join_all(writes).await {
                match result {
                    Ok(()) => trace!(key = %key, tier = %tier.name, "backfilled"),
                    Err(err) => warn!(key = %key, tier = %tier.name, error = %err, "backfill failed"),
                }
            }
        });
    }

    /// Writes `value` to every tier. `ttl` of `None` uses each tier's default.
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let writes = self.tiers.iter().map(|tier| {
            let value = value.clone();
            async move { (tier, tier.backend.set(key, value, ttl).await) }
        });
        for (tier, result) in join_all(writes).await {
            if let Err(err) = result {
                warn!(key, tier = %tier.name, error = %err, "cache write failed for tier");
            }
        }
    }

    pub async fn delete(&self, key: &str) {
        let deletes = self
            .tiers
            .iter()
            .map(|tier| async move { (tier, tier.backend.delete(key).await) });
        for (tier, result) in join_all(deletes).await {
            if let Err(err) = result {
                warn!(key, tier = %tier.name, error = %err, "cache delete failed for tier");
            }
        }
    }

    pub async fn clear_all(&self) {
        let clears = self
            .tiers
            .iter()
            .map(|tier| async move { (tier, tier.backend.clear_all().await) });
        for (tier, result) in join_all(clears).await {
            if let Err(err) = result {
                warn!(tier = %tier.name, error = %err, "cache clear failed for tier");
            }
        }
    }

    pub async fn clear_by_prefix(&self, prefix: &str) {
        let clears = self
            .tiers
            .iter()
            .map(|tier| async move { (tier, tier.backend.clear_by_prefix(prefix).await) });
        for (tier, result) in join_all(clears).await {
            if let Err(err) = result {
                warn!(prefix, tier = %tier.name, error = %err, "cache prefix clear failed for tier");
            }
        }
    }

    /// Collects every tier's stats concurrently.
    pub async fn stats(&self) -> TieredStats {
        let reports = join_all(self.tiers.iter().map(|tier| async move {
            TierStats {
                name: tier.name.clone(),
                stats: tier.backend.stats().await,
            }
        }))
        .await;

        let available = reports.iter().all(|r| r.stats.available);
        let entry_count = reports
            .iter()
            .filter_map(|r| r.stats.entry_count)
            .reduce(|a, b| a.saturating_add(b));

        TieredStats {
            available,
            entry_count,
            tiers: reports,
            timestamp: SystemTime::now(),
        }
    }

    /// Snapshot of the lookup counters.
    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.lock().clone()
    }

    pub fn reset_metrics(&self) {
        *self.metrics.lock() = CacheMetrics::default();
    }

    /// Returns the cached value for `key`, or computes, stores and returns it.
    ///
    /// An error from `compute` is returned as-is and nothing is cached.
    pub async fn get_or_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        let value = compute().await?;
        self.set(key, value.clone(), ttl).await;
        Ok(value)
    }
}
