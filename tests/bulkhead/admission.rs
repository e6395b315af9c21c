use super::{bulkhead, hold_slot, wait_until};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tiered_resilience_bulkhead::{Bulkhead, BulkheadError};

#[tokio::test]
async fn never_more_than_max_concurrent_in_flight() {
    let bh = bulkhead(3, 50);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let bh = bh.clone();
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        handles.push(tokio::spawn(async move {
            bh.execute(|| async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(())
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    let stats = bh.stats();
    assert_eq!(stats.completed, 20);
    assert_eq!(stats.active, 0);
    assert_eq!(stats.queued, 0);
}

#[tokio::test]
async fn overflow_is_rejected_without_running() {
    let bh = bulkhead(1, 1);
    let (release, holder) = hold_slot(&bh).await;

    let queued = {
        let bh = bh.clone();
        tokio::spawn(async move { bh.execute(|| async { Ok::<_, ()>(1) }).await })
    };
    wait_until(|| bh.stats().queued == 1).await;

    let ran = AtomicBool::new(false);
    let err = bh
        .execute(|| async {
            ran.store(true, Ordering::SeqCst);
            Ok::<_, ()>(())
        })
        .await
        .unwrap_err();

    assert!(!ran.load(Ordering::SeqCst));
    match err {
        BulkheadError::QueueFull {
            active, queue_size, ..
        } => {
            assert_eq!(active, 1);
            assert_eq!(queue_size, 1);
        }
        other => panic!("expected QueueFull, got {other:?}"),
    }
    assert_eq!(bh.stats().rejected, 1);

    release.send(()).unwrap();
    holder.await.unwrap().unwrap();
    assert_eq!(queued.await.unwrap().unwrap(), 1);
}

#[tokio::test]
async fn zero_queue_rejects_immediately() {
    let bh = bulkhead(1, 0);
    let (release, holder) = hold_slot(&bh).await;

    let err = bh.execute(|| async { Ok::<_, ()>(()) }).await.unwrap_err();
    assert!(err.is_queue_full());

    drop(release);
    holder.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_as_failure_and_frees_the_slot() {
    let timeouts = Arc::new(AtomicUsize::new(0));
    let t = Arc::clone(&timeouts);
    let bh = Bulkhead::builder()
        .max_concurrent(1)
        .timeout(Duration::from_millis(100))
        .on_call_timeout(move |_| {
            t.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();

    let err = bh
        .execute(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ()>(())
        })
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    let stats = bh.stats();
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.active, 0);
    assert_eq!(timeouts.load(Ordering::SeqCst), 1);

    assert_eq!(bh.execute(|| async { Ok::<_, ()>(2) }).await.unwrap(), 2);
}

#[tokio::test]
async fn operation_errors_free_the_slot() {
    let bh = bulkhead(1, 0);
    for _ in 0..3 {
        let err = bh.execute(|| async { Err::<(), _>("boom") }).await.unwrap_err();
        assert_eq!(err.into_inner(), Some("boom"));
    }
    let stats = bh.stats();
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.rejected, 0);
}

#[tokio::test]
async fn cancelled_waiter_gives_up_its_place() {
    let bh = bulkhead(1, 1);
    let (release, holder) = hold_slot(&bh).await;

    let ran = Arc::new(AtomicBool::new(false));
    let waiter = {
        let bh = bh.clone();
        let ran = Arc::clone(&ran);
        tokio::spawn(async move {
            bh.execute(|| async move {
                ran.store(true, Ordering::SeqCst);
                Ok::<_, ()>(())
            })
            .await
        })
    };
    wait_until(|| bh.stats().queued == 1).await;

    waiter.abort();
    let _ = waiter.await;
    wait_until(|| bh.stats().queued == 0).await;

    release.send(()).unwrap();
    holder.await.unwrap().unwrap();

    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(bh.stats().active, 0);
    assert_eq!(bh.execute(|| async { Ok::<_, ()>(7) }).await.unwrap(), 7);
}
