//! A two-tier cache whose fill path runs through a per-subsystem gate.
//!
//! The "ledger" backend fails every third call. Watch the circuit open,
//! the cache keep serving what it already holds, and the circuit recover.
//!
//! Run with:
//! ```sh
//! RUST_LOG=info cargo run -p tiered-resilience --example gated_cache
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tiered_resilience::cache::{InProcessStore, RemoteStore};
use tiered_resilience::{
    build_tiered_cache, GatedCache, ResilienceRegistry, ResilienceSettings,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct LedgerError(&'static str);

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ledger: {}", self.0)
    }
}

impl std::error::Error for LedgerError {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = ResilienceSettings::from_toml(
        r#"
        [circuit_breakers.ledger]
        failure_threshold = 2
        reset_timeout_ms = 300
        half_open_max_calls = 1

        [[cache.tiers]]
        name = "memory"
        kind = "memory"
        default_ttl_secs = 1

        [[cache.tiers]]
        name = "remote"
        kind = "remote"
        default_ttl_secs = 30
        "#,
    )?;
    let registry = ResilienceRegistry::new(settings.clone())?;

    let store: Arc<dyn RemoteStore> = Arc::new(InProcessStore::new());
    let cache = build_tiered_cache::<u64>(&settings.cache, Some(store))?;
    let balances = GatedCache::new(cache, registry.gate("ledger")?);

    let calls = Arc::new(AtomicUsize::new(0));
    for round in 0..12u64 {
        let key = format!("balance:{}", round % 4);
        let calls = Arc::clone(&calls);
        let result = balances
            .get_or_compute(&key, None, || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n % 3 == 2 {
                    Err(LedgerError("connection reset"))
                } else {
                    Ok(round * 100)
                }
            })
            .await;

        let breaker = balances.gate().circuit_breaker();
        match result {
            Ok(value) => println!("{key} = {value} (circuit {:?})", breaker.state()),
            Err(e) => println!("{key} failed: {e} (circuit {:?})", breaker.state()),
        }
        tokio::time::sleep(Duration::from_millis(120)).await;
    }

    println!("\nmetrics: {:?}", balances.cache().metrics());
    println!("{}", serde_json::to_string_pretty(&registry.snapshot())?);
    Ok(())
}
