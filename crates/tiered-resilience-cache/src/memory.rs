//! In-process LRU tier.

use crate::backend::CacheBackend;
use crate::entry::{CacheEntry, CacheStats};
use crate::error::CacheError;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tiered_resilience_core::ConfigError;
use tracing::debug;

/// Bounded in-process tier with per-entry TTL and least-recently-used
/// eviction.
///
/// Expiry is lazy: an expired entry is dropped when it is next read, or in
/// bulk by [`MemoryBackend::purge_expired`].
pub struct MemoryBackend<V> {
    entries: Mutex<LruCache<String, CacheEntry<V>>>,
    capacity: NonZeroUsize,
    default_ttl: Duration,
    version: String,
    evictions: AtomicU64,
}

impl<V> MemoryBackend<V> {
    /// Creates a builder with default values.
    pub fn builder() -> MemoryBackendBuilder<V> {
        MemoryBackendBuilder::new()
    }

    /// Drops every expired or stale-version entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let dead: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_valid_for(&self.version))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &dead {
            entries.pop(key);
        }
        dead.len()
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries pushed out by capacity pressure since construction.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

/// Builder for [`MemoryBackend`].
pub struct MemoryBackendBuilder<V> {
    max_entries: usize,
    default_ttl: Duration,
    version: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> MemoryBackendBuilder<V> {
    pub fn new() -> Self {
        Self {
            max_entries: 1_000,
            default_ttl: Duration::from_secs(60),
            version: "1".to_string(),
            _value: PhantomData,
        }
    }

    /// Sets the capacity; the least recently used entry goes first.
    ///
    /// Default: 1000
    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Sets the TTL used when a write does not specify one.
    ///
    /// Default: 60 seconds
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the version tag. Entries written under another tag read as misses.
    ///
    /// Default: "1"
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<MemoryBackend<V>, ConfigError> {
        let capacity = NonZeroUsize::new(self.max_entries).ok_or_else(|| {
            ConfigError::invalid("cache", "max_entries", "must be greater than zero")
        })?;
        ConfigError::require_nonzero("cache", "default_ttl", self.default_ttl.as_millis())?;

        Ok(MemoryBackend {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            default_ttl: self.default_ttl,
            version: self.version,
            evictions: AtomicU64::new(0),
        })
    }
}

impl<V> Default for MemoryBackendBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> CacheBackend<V> for MemoryBackend<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let mut entries = self.entries.lock();
        let valid = match entries.get(key) {
            Some(entry) => entry.is_valid_for(&self.version),
            None => return Ok(None),
        };
        if !valid {
            entries.pop(key);
            return Ok(None);
        }
        Ok(entries.peek(key).map(|entry| entry.data.clone()))
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let entry = CacheEntry::new(value, self.version.clone(), ttl.unwrap_or(self.default_ttl));
        let displaced = self.entries.lock().push(key.to_string(), entry);
        if let Some((old_key, _)) = displaced {
            if old_key != key {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(evicted = %old_key, "memory tier at capacity, evicted least recently used entry");
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().pop(key);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        self.entries.lock().clear();
        Ok(())
    }

    async fn clear_by_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        let matching: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matching {
            entries.pop(key);
        }
        debug!(prefix, removed = matching.len(), "cleared memory tier by prefix");
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let len = self.entries.lock().len();
        CacheStats::new(CacheBackend::<V>::backend_type(self), true)
            .with_entry_count(len as u64)
            .with_metadata("capacity", self.capacity.get() as u64)
            .with_metadata("default_ttl_secs", self.default_ttl.as_secs())
            .with_metadata("evictions", self.evictions())
            .with_metadata("version", self.version.clone())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
