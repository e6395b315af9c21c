use super::{hold_slot, wait_until};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiered_resilience_bulkhead::Bulkhead;

fn single_lane(priority_queueing: bool) -> Bulkhead {
    Bulkhead::builder()
        .name("reports")
        .max_concurrent(1)
        .queue_size(10)
        .priority_queueing(priority_queueing)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Queues one call per priority, in the given order, behind a held slot,
/// then releases the slot and returns the order the calls ran in.
async fn run_order(bh: &Bulkhead, priorities: &[i32]) -> Vec<i32> {
    let (release, holder) = hold_slot(bh).await;
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for (i, &priority) in priorities.iter().enumerate() {
        let lane = bh.clone();
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            lane.execute_with_priority(priority, || async move {
                order.lock().unwrap().push(priority);
                Ok::<_, ()>(())
            })
            .await
        }));
        wait_until(|| bh.stats().queued == i + 1).await;
    }

    release.send(()).unwrap();
    holder.await.unwrap().unwrap();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    let ran = order.lock().unwrap().clone();
    ran
}

#[tokio::test]
async fn higher_priority_is_admitted_first() {
    let bh = single_lane(true);
    assert_eq!(run_order(&bh, &[1, 5, 3]).await, [5, 3, 1]);
}

#[tokio::test]
async fn equal_priorities_keep_arrival_order() {
    let bh = single_lane(true);
    assert_eq!(run_order(&bh, &[2, 7, 2, 7, 2]).await, [7, 7, 2, 2, 2]);
}

#[tokio::test]
async fn fifo_when_priority_queueing_is_off() {
    let bh = single_lane(false);
    assert_eq!(run_order(&bh, &[1, 5, 3]).await, [1, 5, 3]);
}

#[tokio::test]
async fn negative_priorities_go_last() {
    let bh = single_lane(true);
    assert_eq!(run_order(&bh, &[-4, 0, 9]).await, [9, 0, -4]);
}

#[tokio::test]
async fn queue_status_lists_waiters_in_admission_order() {
    let bh = single_lane(true);
    let (release, holder) = hold_slot(&bh).await;

    let mut handles = Vec::new();
    for (i, priority) in [2, 9, 5].into_iter().enumerate() {
        let lane = bh.clone();
        handles.push(tokio::spawn(async move {
            lane.execute_with_priority(priority, || async { Ok::<_, ()>(()) })
                .await
        }));
        wait_until(|| bh.stats().queued == i + 1).await;
    }

    let status = bh.queue_status();
    assert_eq!(status.queued, 3);
    assert_eq!(status.queue_size, 10);
    assert!(status.priority_queueing);
    let priorities: Vec<i32> = status.waiting.iter().map(|w| w.priority).collect();
    assert_eq!(priorities, [9, 5, 2]);

    release.send(()).unwrap();
    holder.await.unwrap().unwrap();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert!(bh.queue_status().waiting.is_empty());
}
