use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tiered_resilience::cache::{InProcessStore, RemoteStore};
use tiered_resilience::{
    CacheSettings, CircuitBreakerOverride, GatedCache, ResilienceRegistry, ResilienceSettings,
    TierKind, TierSettings, build_tiered_cache,
};

struct Service {
    registry: ResilienceRegistry,
    store: Arc<InProcessStore>,
    settings: ResilienceSettings,
}

impl Service {
    fn new() -> Self {
        let mut settings = ResilienceSettings::default();
        settings.cache = CacheSettings {
            tiers: vec![
                TierSettings::new("memory", TierKind::Memory),
                TierSettings::new("remote", TierKind::Remote),
            ],
        };
        settings.circuit_breakers.insert(
            "accounts".into(),
            CircuitBreakerOverride {
                failure_threshold: Some(2),
                ..Default::default()
            },
        );
        Self {
            registry: ResilienceRegistry::new(settings.clone()).unwrap(),
            store: Arc::new(InProcessStore::new()),
            settings,
        }
    }

    /// A cache as a freshly started replica would see it: empty memory,
    /// shared remote store.
    fn replica(&self) -> GatedCache<u64> {
        let store: Arc<dyn RemoteStore> = self.store.clone();
        let cache = build_tiered_cache(&self.settings.cache, Some(store)).unwrap();
        GatedCache::new(cache, self.registry.gate("accounts").unwrap())
    }
}

#[tokio::test]
async fn computed_values_are_shared_through_the_remote_tier() {
    let service = Service::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = service.replica();
    let c = Arc::clone(&calls);
    let balance = first
        .get_or_compute("balance:1", None, || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(900)
        })
        .await
        .unwrap();
    assert_eq!(balance, 900);

    let second = service.replica();
    let c = Arc::clone(&calls);
    let balance = second
        .get_or_compute("balance:1", None, || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(0)
        })
        .await
        .unwrap();
    assert_eq!(balance, 900);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        second.cache().metrics().last_hit_tier.as_deref(),
        Some("remote")
    );
}

#[tokio::test]
async fn cached_values_are_served_while_the_circuit_is_open() {
    let service = Service::new();
    let cache = service.replica();

    cache
        .get_or_compute("balance:1", None, || async { Ok::<_, String>(10) })
        .await
        .unwrap();
    for key in ["balance:2", "balance:3"] {
        let err = cache
            .get_or_compute(key, None, || async { Err::<u64, _>("ledger down".to_string()) })
            .await
            .unwrap_err();
        assert!(err.is_application());
    }
    assert!(cache.gate().circuit_breaker().is_open());

    let hit = cache
        .get_or_compute("balance:1", None, || async { Ok::<_, String>(0) })
        .await
        .unwrap();
    assert_eq!(hit, 10);

    let err = cache
        .get_or_compute("balance:4", None, || async { Ok::<_, String>(0) })
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
}

#[tokio::test]
async fn invalidation_forces_a_recompute() {
    let service = Service::new();
    let cache = service.replica();

    cache
        .get_or_compute("report:q1", None, || async { Ok::<_, String>(1) })
        .await
        .unwrap();
    cache
        .get_or_compute("report:q2", None, || async { Ok::<_, String>(2) })
        .await
        .unwrap();

    cache.invalidate("report:q1").await;
    let q1 = cache
        .get_or_compute("report:q1", None, || async { Ok::<_, String>(11) })
        .await
        .unwrap();
    assert_eq!(q1, 11);

    cache.invalidate_prefix("report:").await;
    assert!(service.store.is_empty());
    let q2 = cache
        .get_or_compute("report:q2", None, || async { Ok::<_, String>(22) })
        .await
        .unwrap();
    assert_eq!(q2, 22);
}
