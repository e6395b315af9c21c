use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tiered_resilience_bulkhead::{Bulkhead, BulkheadLayer};
use tower::{Layer, ServiceExt, service_fn};

#[tokio::test]
async fn services_from_one_layer_share_slots() {
    let bulkhead = Bulkhead::builder()
        .name("db")
        .max_concurrent(2)
        .queue_size(16)
        .build()
        .unwrap();
    let layer = BulkheadLayer::new(bulkhead.clone());

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..8u32 {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        let svc = layer.layer(service_fn(move |n: u32| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(n + 1)
            }
        }));
        handles.push(tokio::spawn(svc.oneshot(i)));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap().unwrap();
    }
    assert_eq!(total, (1..=8).sum::<u32>());
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(bulkhead.stats().completed, 8);
}
