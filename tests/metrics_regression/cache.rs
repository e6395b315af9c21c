//! Tiered cache metrics regression tests

use super::helpers::*;
use async_trait::async_trait;
use serial_test::serial;
use std::time::Duration;
use tiered_resilience_cache::{
    CacheBackend, CacheError, CacheStats, MemoryBackend, Tier, TieredCache,
};

struct Unreachable;

#[async_trait]
impl CacheBackend<u32> for Unreachable {
    async fn get(&self, _: &str) -> Result<Option<u32>, CacheError> {
        Err(CacheError::backend("unreachable", "connection refused"))
    }
    async fn set(&self, _: &str, _: u32, _: Option<Duration>) -> Result<(), CacheError> {
        Ok(())
    }
    async fn delete(&self, _: &str) -> Result<(), CacheError> {
        Ok(())
    }
    async fn clear_all(&self) -> Result<(), CacheError> {
        Ok(())
    }
    async fn clear_by_prefix(&self, _: &str) -> Result<(), CacheError> {
        Ok(())
    }
    async fn stats(&self) -> CacheStats {
        CacheStats::new("unreachable", false)
    }
    fn backend_type(&self) -> &'static str {
        "unreachable"
    }
}

#[tokio::test]
#[serial]
async fn cache_metrics_exist() {
    init_recorder();

    let memory: MemoryBackend<u32> = MemoryBackend::builder().build().unwrap();
    let cache = TieredCache::new(vec![
        Tier::new("metrics_flaky", Unreachable),
        Tier::new("metrics_memory", memory),
    ])
    .unwrap();

    cache.set("k", 1, None).await;
    cache.get("k").await;
    cache.get("absent").await;

    assert_counter_exists("cache_lookups_total");
    assert_metric_has_label("cache_lookups_total", "outcome", "hit");
    assert_metric_has_label("cache_lookups_total", "outcome", "miss");
    assert_metric_has_label("cache_lookups_total", "tier", "metrics_memory");

    assert_counter_exists("cache_tier_errors_total");
    assert_metric_has_label("cache_tier_errors_total", "tier", "metrics_flaky");

    assert_histogram_exists("cache_lookup_duration_seconds");
}
