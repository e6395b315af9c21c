//! Stored cache entries and the stats record tiers report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A cached value with its version tag and validity window.
///
/// Timestamps are milliseconds since the Unix epoch so the same envelope can
/// be serialized into a remote store. `expires_at` is always strictly after
/// `cached_at`; the entry is logically absent once the clock passes
/// `expires_at`, whether or not the backend has physically removed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub version: String,
    pub cached_at: u64,
    pub expires_at: u64,
}

impl<T> CacheEntry<T> {
    /// Wraps `data` for `ttl`. A TTL under one millisecond is rounded up so
    /// the entry is never born expired.
    pub fn new(data: T, version: impl Into<String>, ttl: Duration) -> Self {
        let cached_at = now_millis();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        Self {
            data,
            version: version.into(),
            cached_at,
            expires_at: cached_at.saturating_add(ttl_ms),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at
    }

    /// An entry is usable when unexpired and written under `version`.
    pub fn is_valid_for(&self, version: &str) -> bool {
        self.version == version && !self.is_expired()
    }

    /// Time left before expiry, `None` once expired.
    pub fn remaining_ttl(&self) -> Option<Duration> {
        let now = now_millis();
        if self.is_expired_at(now) {
            None
        } else {
            Some(Duration::from_millis(self.expires_at - now))
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Point-in-time health and size report from one backend.
///
/// Produced on demand and never persisted. `available == false` is how a
/// backend reports ill health; `stats()` itself never fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub backend_type: String,
    pub available: bool,
    pub entry_count: Option<u64>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub timestamp: SystemTime,
}

impl CacheStats {
    pub fn new(backend_type: impl Into<String>, available: bool) -> Self {
        Self {
            backend_type: backend_type.into(),
            available,
            entry_count: None,
            metadata: BTreeMap::new(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_entry_count(mut self, count: u64) -> Self {
        self.entry_count = Some(count);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
