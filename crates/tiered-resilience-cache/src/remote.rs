//! Remote key-value tier.
//!
//! [`RemoteBackend`] speaks to a distributed store through the narrow
//! [`RemoteStore`] trait. Values travel as JSON-encoded [`CacheEntry`]
//! envelopes under a namespace prefix, so several services can share one
//! store and a `clear_all` only touches this cache's keys.

use crate::backend::CacheBackend;
use crate::entry::{CacheEntry, CacheStats};
use crate::error::CacheError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiered_resilience_core::ConfigError;
use tracing::{debug, info, warn};

/// Minimal string key-value surface a remote tier needs.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Writes `value` with a server-side expiry.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn del(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Lists keys beginning with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    /// Whether `scan_prefix` is supported. When it is not, prefix and full
    /// clears are skipped with a log line.
    fn supports_prefix_scan(&self) -> bool {
        true
    }

    fn store_type(&self) -> &'static str;
}

/// Cache tier backed by a [`RemoteStore`].
///
/// Every store failure is logged and absorbed: reads become misses, writes
/// and deletes become no-ops.
pub struct RemoteBackend<V> {
    store: Arc<dyn RemoteStore>,
    namespace: String,
    default_ttl: Duration,
    version: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> RemoteBackend<V> {
    pub fn builder(store: Arc<dyn RemoteStore>) -> RemoteBackendBuilder<V> {
        RemoteBackendBuilder::new(store)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    async fn remove_matching(&self, prefix: &str) {
        let store_type = self.store.store_type();
        if !self.store.supports_prefix_scan() {
            info!(
                store = store_type,
                prefix, "remote store cannot enumerate keys; prefix clear skipped"
            );
            return;
        }
        let keys = match self.store.scan_prefix(prefix).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(store = store_type, prefix, error = %err, "remote key scan failed; clear skipped");
                return;
            }
        };
        if keys.is_empty() {
            return;
        }
        match self.store.del(&keys).await {
            Ok(()) => debug!(store = store_type, prefix, removed = keys.len(), "cleared remote keys"),
            Err(err) => warn!(store = store_type, prefix, error = %err, "remote delete failed"),
        }
    }
}

/// Builder for [`RemoteBackend`].
pub struct RemoteBackendBuilder<V> {
    store: Arc<dyn RemoteStore>,
    namespace: String,
    default_ttl: Duration,
    version: String,
    _value: PhantomData<fn() -> V>,
}

impl<V> RemoteBackendBuilder<V> {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            namespace: "cache:".to_string(),
            default_ttl: Duration::from_secs(300),
            version: "1".to_string(),
            _value: PhantomData,
        }
    }

    /// Prefix prepended to every key.
    ///
    /// Default: "cache:"
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Default: 300 seconds
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Default: "1"
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn build(self) -> Result<RemoteBackend<V>, ConfigError> {
        ConfigError::require_nonzero("cache", "default_ttl", self.default_ttl.as_millis())?;
        Ok(RemoteBackend {
            store: self.store,
            namespace: self.namespace,
            default_ttl: self.default_ttl,
            version: self.version,
            _value: PhantomData,
        })
    }
}

#[async_trait]
impl<V> CacheBackend<V> for RemoteBackend<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let full_key = self.full_key(key);
        let raw = match self.store.get(&full_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(store = self.store.store_type(), key, error = %err, "remote read failed; treating as miss");
                return Ok(None);
            }
        };

        match serde_json::from_str::<CacheEntry<V>>(&raw) {
            Ok(entry) if entry.is_valid_for(&self.version) => Ok(Some(entry.data)),
            Ok(_) => Ok(None),
            Err(err) => {
                warn!(key, error = %err, "undecodable remote entry; treating as miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry::new(value, self.version.clone(), ttl);
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "could not encode cache entry; write dropped");
                return Ok(());
            }
        };
        if let Err(err) = self.store.set_ex(&self.full_key(key), raw, ttl).await {
            warn!(store = self.store.store_type(), key, error = %err, "remote write failed");
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        if let Err(err) = self.store.del(&[self.full_key(key)]).await {
            warn!(store = self.store.store_type(), key, error = %err, "remote delete failed");
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        self.remove_matching(&self.namespace).await;
        Ok(())
    }

    async fn clear_by_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        self.remove_matching(&self.full_key(prefix)).await;
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let available = match self.store.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(store = self.store.store_type(), error = %err, "remote store health check failed");
                false
            }
        };

        let mut stats = CacheStats::new(CacheBackend::<V>::backend_type(self), available)
            .with_metadata("store", self.store.store_type())
            .with_metadata("namespace", self.namespace.clone())
            .with_metadata("default_ttl_secs", self.default_ttl.as_secs())
            .with_metadata("version", self.version.clone());

        if available && self.store.supports_prefix_scan() {
            if let Ok(keys) = self.store.scan_prefix(&self.namespace).await {
                stats = stats.with_entry_count(keys.len() as u64);
            }
        }
        stats
    }

    fn backend_type(&self) -> &'static str {
        "remote"
    }
}

/// A [`RemoteStore`] living in this process.
///
/// Behaves like a single-node key-value server: values expire server-side
/// and survive the loss of any [`MemoryBackend`] sharing the process. Used
/// for development, tests, and deployments without a distributed store.
///
/// [`MemoryBackend`]: crate::MemoryBackend
#[derive(Default)]
pub struct InProcessStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InProcessStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live (unexpired) key count.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|(_, deadline)| *deadline > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RemoteStore for InProcessStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some((_, deadline)) => *deadline <= Instant::now(),
            None => return Ok(None),
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let deadline = now
            .checked_add(ttl)
            .ok_or_else(|| {
                CacheError::backend("in_process", format!("ttl {ttl:?} out of range"))
            })?;
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value, deadline));
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, (_, deadline)| *deadline > now);
        Ok(entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "in_process"
    }
}
