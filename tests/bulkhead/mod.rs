//! Tests for the bulkhead.
//!
//! Test organization:
//! - admission.rs: concurrency bound, overflow and timeouts
//! - priority.rs: queue ordering
//! - operations.rs: queue status, clearing, stats and live reconfiguration
//! - layer.rs: the tower layer under concurrent load

mod admission;
mod layer;
mod priority;

use std::time::Duration;
use tiered_resilience_bulkhead::Bulkhead;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub(crate) fn bulkhead(max_concurrent: usize, queue_size: usize) -> Bulkhead {
    Bulkhead::builder()
        .name("test")
        .max_concurrent(max_concurrent)
        .queue_size(queue_size)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Occupies one slot until the returned sender is dropped or fired.
pub(crate) async fn hold_slot(
    bulkhead: &Bulkhead,
) -> (oneshot::Sender<()>, JoinHandle<Result<(), tiered_resilience_bulkhead::BulkheadError<()>>>) {
    let active = bulkhead.stats().active;
    let (release, hold) = oneshot::channel::<()>();
    let bh = bulkhead.clone();
    let handle = tokio::spawn(async move {
        bh.execute(|| async move {
            let _ = hold.await;
            Ok::<_, ()>(())
        })
        .await
    });
    wait_until(|| bulkhead.stats().active > active).await;
    (release, handle)
}

/// Yields until `condition` holds, panicking after a generous bound.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
