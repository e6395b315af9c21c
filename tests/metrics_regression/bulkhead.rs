//! Bulkhead metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::time::Duration;
use tiered_resilience_bulkhead::Bulkhead;

#[tokio::test]
#[serial]
async fn bulkhead_metrics_exist() {
    init_recorder();

    let bulkhead = Bulkhead::builder()
        .name("metrics_bh")
        .max_concurrent(1)
        .queue_size(0)
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    bulkhead.execute(|| async { Ok::<_, ()>(()) }).await.unwrap();
    let _ = bulkhead.execute(|| async { Err::<(), _>(()) }).await;
    let _ = bulkhead
        .execute(|| async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<_, ()>(())
        })
        .await;

    let (release, hold) = tokio::sync::oneshot::channel::<()>();
    let holder = {
        let bulkhead = bulkhead.clone();
        tokio::spawn(async move {
            bulkhead
                .execute(|| async move {
                    let _ = hold.await;
                    Ok::<_, ()>(())
                })
                .await
        })
    };
    while bulkhead.stats().active == 0 {
        tokio::task::yield_now().await;
    }
    let _ = bulkhead.execute(|| async { Ok::<_, ()>(()) }).await;
    let _ = release.send(());
    let _ = holder.await;

    for name in [
        "bulkhead_calls_permitted_total",
        "bulkhead_calls_rejected_total",
        "bulkhead_calls_finished_total",
        "bulkhead_calls_failed_total",
        "bulkhead_calls_timed_out_total",
    ] {
        assert_counter_exists(name);
        assert_metric_has_label(name, "bulkhead", "metrics_bh");
    }
    assert_gauge_exists("bulkhead_concurrent_calls");
    assert_histogram_exists("bulkhead_wait_duration_seconds");
    assert_histogram_exists("bulkhead_call_duration_seconds");
}
