//! Per-subsystem bulkheads and circuit breakers.

use crate::gate::Gate;
use crate::settings::ResilienceSettings;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tiered_resilience_bulkhead::{Bulkhead, BulkheadStats};
use tiered_resilience_circuitbreaker::{CircuitBreaker, CircuitStats};
use tiered_resilience_core::ConfigError;

/// Hands out one bulkhead and one circuit breaker per subsystem name,
/// created on first use from [`ResilienceSettings`].
///
/// Construct one at startup and pass it to whatever needs it. Every handle
/// returned for a name shares state with every other handle for that name.
///
/// ```rust
/// use tiered_resilience::{ResilienceRegistry, ResilienceSettings};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = ResilienceRegistry::new(ResilienceSettings::default())?;
/// let finance = registry.gate("finance")?;
/// let total = finance.call(|| async { Ok::<_, std::io::Error>(99) }).await?;
/// assert_eq!(total, 99);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ResilienceRegistry {
    settings: ResilienceSettings,
    bulkheads: RwLock<HashMap<String, Bulkhead>>,
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
}

impl ResilienceRegistry {
    /// # Errors
    ///
    /// Any invalid default or override in `settings`. Nothing is validated
    /// lazily, so a registry that builds will never fail to create an
    /// instance later.
    pub fn new(settings: ResilienceSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            bulkheads: RwLock::new(HashMap::new()),
            breakers: RwLock::new(HashMap::new()),
        })
    }

    pub fn settings(&self) -> &ResilienceSettings {
        &self.settings
    }

    /// The bulkhead for `name`, created on first use.
    pub fn bulkhead(&self, name: &str) -> Result<Bulkhead, ConfigError> {
        if let Some(existing) = self.bulkheads.read().get(name) {
            return Ok(existing.clone());
        }

        let mut bulkheads = self.bulkheads.write();
        if let Some(existing) = bulkheads.get(name) {
            return Ok(existing.clone());
        }
        let settings = self.settings.bulkhead_for(name);
        let bulkhead = settings.builder(name).build()?;
        tracing::info!(
            subsystem = name,
            max_concurrent = settings.max_concurrent,
            queue_size = settings.queue_size,
            "bulkhead created"
        );
        bulkheads.insert(name.to_string(), bulkhead.clone());
        Ok(bulkhead)
    }

    /// The circuit breaker for `name`, created on first use.
    pub fn circuit_breaker(&self, name: &str) -> Result<CircuitBreaker, ConfigError> {
        if let Some(existing) = self.breakers.read().get(name) {
            return Ok(existing.clone());
        }

        let mut breakers = self.breakers.write();
        if let Some(existing) = breakers.get(name) {
            return Ok(existing.clone());
        }
        let settings = self.settings.circuit_breaker_for(name);
        let breaker = settings.builder(name).build()?;
        tracing::info!(
            subsystem = name,
            failure_threshold = settings.failure_threshold,
            reset_timeout_ms = settings.reset_timeout_ms,
            "circuit breaker created"
        );
        breakers.insert(name.to_string(), breaker.clone());
        Ok(breaker)
    }

    /// Bulkhead and breaker for `name` combined.
    pub fn gate(&self, name: &str) -> Result<Gate, ConfigError> {
        Ok(Gate::new(name, self.bulkhead(name)?, self.circuit_breaker(name)?))
    }

    /// Stats for every instance created so far, sorted by name.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            bulkheads: self
                .bulkheads
                .read()
                .iter()
                .map(|(name, b)| (name.clone(), b.stats()))
                .collect(),
            circuit_breakers: self
                .breakers
                .read()
                .iter()
                .map(|(name, cb)| (name.clone(), cb.stats()))
                .collect(),
        }
    }

    /// Resets every circuit breaker created so far.
    pub fn reset_circuit_breakers(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }
}

/// Returned by [`ResilienceRegistry::snapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub bulkheads: BTreeMap<String, BulkheadStats>,
    pub circuit_breakers: BTreeMap<String, CircuitStats>,
}
