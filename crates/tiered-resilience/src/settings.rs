//! Declarative settings for bulkheads, circuit breakers and cache tiers.
//!
//! # Priority (highest to lowest)
//!
//! 1. Environment variables (`TIERED_RESILIENCE_*`, `__` separates levels)
//! 2. Configuration file (`tiered-resilience.toml`)
//! 3. Default values
//!
//! ```toml
//! [bulkhead]
//! max_concurrent = 20
//!
//! [bulkheads.finance]
//! max_concurrent = 4
//! priority_queueing = true
//!
//! [circuit_breakers.events]
//! failure_threshold = 3
//!
//! [[cache.tiers]]
//! name = "memory"
//! kind = "memory"
//! max_entries = 5000
//!
//! [[cache.tiers]]
//! name = "remote"
//! kind = "remote"
//! default_ttl_secs = 600
//! ```
//!
//! `TIERED_RESILIENCE_BULKHEADS__FINANCE__MAX_CONCURRENT=8` overrides the
//! finance bulkhead from the environment.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tiered_resilience_bulkhead::{Bulkhead, BulkheadConfigBuilder};
use tiered_resilience_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfigBuilder, FailureCountPolicy,
};
use tiered_resilience_core::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "tiered-resilience.toml";
pub const ENV_PREFIX: &str = "TIERED_RESILIENCE_";

/// Limits applied to a bulkhead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadSettings {
    pub max_concurrent: usize,
    pub queue_size: usize,
    pub timeout_ms: u64,
    pub priority_queueing: bool,
}

impl Default for BulkheadSettings {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            queue_size: 100,
            timeout_ms: 30_000,
            priority_queueing: false,
        }
    }
}

impl BulkheadSettings {
    /// A builder pre-loaded with these limits.
    pub fn builder(&self, name: &str) -> BulkheadConfigBuilder {
        Bulkhead::builder()
            .name(name)
            .max_concurrent(self.max_concurrent)
            .queue_size(self.queue_size)
            .timeout(Duration::from_millis(self.timeout_ms))
            .priority_queueing(self.priority_queueing)
    }

    fn with(&self, overrides: &BulkheadOverride) -> Self {
        Self {
            max_concurrent: overrides.max_concurrent.unwrap_or(self.max_concurrent),
            queue_size: overrides.queue_size.unwrap_or(self.queue_size),
            timeout_ms: overrides.timeout_ms.unwrap_or(self.timeout_ms),
            priority_queueing: overrides.priority_queueing.unwrap_or(self.priority_queueing),
        }
    }
}

/// Per-subsystem bulkhead settings; unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkheadOverride {
    pub max_concurrent: Option<usize>,
    pub queue_size: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub priority_queueing: Option<bool>,
}

/// Thresholds applied to a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: usize,
    pub reset_timeout_ms: u64,
    pub half_open_max_calls: usize,
    pub timeout_ms: u64,
    pub failure_count_policy: FailureCountPolicy,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 60_000,
            half_open_max_calls: 3,
            timeout_ms: 10_000,
            failure_count_policy: FailureCountPolicy::SinceReset,
        }
    }
}

impl CircuitBreakerSettings {
    /// A builder pre-loaded with these thresholds.
    pub fn builder(&self, name: &str) -> CircuitBreakerConfigBuilder {
        CircuitBreaker::builder()
            .name(name)
            .failure_threshold(self.failure_threshold)
            .reset_timeout(Duration::from_millis(self.reset_timeout_ms))
            .half_open_max_calls(self.half_open_max_calls)
            .timeout(Duration::from_millis(self.timeout_ms))
            .failure_count_policy(self.failure_count_policy)
    }

    fn with(&self, overrides: &CircuitBreakerOverride) -> Self {
        Self {
            failure_threshold: overrides.failure_threshold.unwrap_or(self.failure_threshold),
            reset_timeout_ms: overrides.reset_timeout_ms.unwrap_or(self.reset_timeout_ms),
            half_open_max_calls: overrides
                .half_open_max_calls
                .unwrap_or(self.half_open_max_calls),
            timeout_ms: overrides.timeout_ms.unwrap_or(self.timeout_ms),
            failure_count_policy: overrides
                .failure_count_policy
                .unwrap_or(self.failure_count_policy),
        }
    }
}

/// Per-subsystem breaker settings; unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerOverride {
    pub failure_threshold: Option<usize>,
    pub reset_timeout_ms: Option<u64>,
    pub half_open_max_calls: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub failure_count_policy: Option<FailureCountPolicy>,
}

/// Which backend a cache tier uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    Memory,
    Remote,
    Managed,
}

/// One cache tier. Unset fields take the backend's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSettings {
    pub name: String,
    pub kind: TierKind,
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,
    /// Memory tiers only.
    #[serde(default)]
    pub max_entries: Option<usize>,
    #[serde(default)]
    pub version: Option<String>,
    /// Remote tiers only: key prefix in the shared store.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Managed tiers only: the hosted service name.
    #[serde(default)]
    pub service: Option<String>,
}

impl TierSettings {
    pub fn new(name: impl Into<String>, kind: TierKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default_ttl_secs: None,
            max_entries: None,
            version: None,
            namespace: None,
            service: None,
        }
    }
}

/// Cache tiers, fastest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub tiers: Vec<TierSettings>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            tiers: vec![TierSettings::new("memory", TierKind::Memory)],
        }
    }
}

/// Everything the registry and cache builder need.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Defaults for every bulkhead.
    pub bulkhead: BulkheadSettings,
    /// Defaults for every circuit breaker.
    pub circuit_breaker: CircuitBreakerSettings,
    /// Per-subsystem bulkhead overrides, keyed by subsystem name.
    pub bulkheads: BTreeMap<String, BulkheadOverride>,
    /// Per-subsystem breaker overrides, keyed by subsystem name.
    pub circuit_breakers: BTreeMap<String, CircuitBreakerOverride>,
    pub cache: CacheSettings,
}

impl ResilienceSettings {
    /// Loads settings from `tiered-resilience.toml` (if present) and the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if a source cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(DEFAULT_CONFIG_FILE)
    }

    /// Loads settings from a specific file path and the environment.
    ///
    /// A missing file is not an error; its layer is simply empty.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Parses settings from a TOML string over the defaults.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml_str))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Effective bulkhead settings for `name`.
    pub fn bulkhead_for(&self, name: &str) -> BulkheadSettings {
        match self.bulkheads.get(name) {
            Some(overrides) => self.bulkhead.with(overrides),
            None => self.bulkhead.clone(),
        }
    }

    /// Effective circuit breaker settings for `name`.
    pub fn circuit_breaker_for(&self, name: &str) -> CircuitBreakerSettings {
        match self.circuit_breakers.get(name) {
            Some(overrides) => self.circuit_breaker.with(overrides),
            None => self.circuit_breaker.clone(),
        }
    }

    /// Checks the defaults and every override without building anything
    /// long-lived.
    ///
    /// # Errors
    ///
    /// The first invalid value found, as [`ConfigError::Invalid`], or
    /// [`ConfigError::NoTiers`] for an empty tier list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bulkhead.builder("default").into_config()?;
        for name in self.bulkheads.keys() {
            self.bulkhead_for(name).builder(name).into_config()?;
        }

        self.circuit_breaker.builder("default").into_config()?;
        for name in self.circuit_breakers.keys() {
            self.circuit_breaker_for(name).builder(name).into_config()?;
        }

        if self.cache.tiers.is_empty() {
            return Err(ConfigError::NoTiers);
        }
        for tier in &self.cache.tiers {
            if tier.default_ttl_secs == Some(0) {
                return Err(ConfigError::invalid(
                    "cache",
                    "default_ttl_secs",
                    "must be greater than zero",
                ));
            }
            if tier.max_entries == Some(0) {
                return Err(ConfigError::invalid(
                    "cache",
                    "max_entries",
                    "must be greater than zero",
                ));
            }
        }
        Ok(())
    }
}
