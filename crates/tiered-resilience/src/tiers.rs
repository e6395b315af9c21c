//! Building a [`TieredCache`] from [`CacheSettings`].

use crate::settings::{CacheSettings, TierKind, TierSettings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tiered_resilience_cache::{
    CacheBackend, ManagedBackend, MemoryBackend, RemoteBackend, RemoteStore, Tier, TieredCache,
};
use tiered_resilience_core::ConfigError;

/// Composes the configured tiers, fastest first.
///
/// Every `remote` tier shares `remote_store`.
///
/// # Errors
///
/// [`ConfigError::NoTiers`] for an empty list,
/// [`ConfigError::MissingRemoteStore`] when a remote tier is configured but
/// no store was given, or any backend validation error.
pub fn build_tiered_cache<V>(
    settings: &CacheSettings,
    remote_store: Option<Arc<dyn RemoteStore>>,
) -> Result<TieredCache<V>, ConfigError>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let tiers = settings
        .tiers
        .iter()
        .map(|tier| build_tier(tier, remote_store.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(
        tiers = ?settings.tiers.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        "tiered cache configured"
    );
    TieredCache::new(tiers)
}

fn build_tier<V>(
    tier: &TierSettings,
    remote_store: Option<&Arc<dyn RemoteStore>>,
) -> Result<Tier<V>, ConfigError>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let ttl = tier.default_ttl_secs.map(Duration::from_secs);

    let backend: Arc<dyn CacheBackend<V>> = match tier.kind {
        TierKind::Memory => {
            let mut builder = MemoryBackend::<V>::builder();
            if let Some(max) = tier.max_entries {
                builder = builder.max_entries(max);
            }
            if let Some(ttl) = ttl {
                builder = builder.default_ttl(ttl);
            }
            if let Some(version) = &tier.version {
                builder = builder.version(version.clone());
            }
            Arc::new(builder.build()?)
        }
        TierKind::Remote => {
            let store = remote_store.ok_or_else(|| ConfigError::MissingRemoteStore {
                tier: tier.name.clone(),
            })?;
            let mut builder = RemoteBackend::<V>::builder(Arc::clone(store));
            if let Some(namespace) = &tier.namespace {
                builder = builder.namespace(namespace.clone());
            }
            if let Some(ttl) = ttl {
                builder = builder.default_ttl(ttl);
            }
            if let Some(version) = &tier.version {
                builder = builder.version(version.clone());
            }
            Arc::new(builder.build()?)
        }
        TierKind::Managed => {
            let service = tier.service.clone().unwrap_or_else(|| tier.name.clone());
            Arc::new(ManagedBackend::new(service))
        }
    };

    Ok(Tier::shared(tier.name.clone(), backend))
}
