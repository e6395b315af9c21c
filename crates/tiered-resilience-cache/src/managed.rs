//! Placeholder tier for an externally managed cache service.

use crate::backend::CacheBackend;
use crate::entry::CacheStats;
use crate::error::CacheError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Stand-in for a hosted cache that has not been wired up.
///
/// It keeps the tier list shape stable across environments: reads always
/// miss, writes are accepted and discarded, and `stats()` reports the tier
/// as unavailable with `status = "not_configured"`.
#[derive(Debug, Clone)]
pub struct ManagedBackend {
    service: String,
}

impl ManagedBackend {
    /// `service` names the managed cache this tier would talk to.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

#[async_trait]
impl<V> CacheBackend<V> for ManagedBackend
where
    V: Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        debug!(service = %self.service, key, "managed cache not configured; miss");
        Ok(None)
    }

    async fn set(&self, key: &str, _value: V, _ttl: Option<Duration>) -> Result<(), CacheError> {
        debug!(service = %self.service, key, "managed cache not configured; write discarded");
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn clear_by_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        warn!(
            service = %self.service,
            prefix, "managed cache has no prefix invalidation; clear skipped"
        );
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        CacheStats::new("managed", false)
            .with_metadata("service", self.service.clone())
            .with_metadata("status", "not_configured")
    }

    fn backend_type(&self) -> &'static str {
        "managed"
    }
}
