use super::support::{ProbeTier, tier};
use std::time::Duration;
use tiered_resilience_cache::TieredCache;

#[tokio::test]
async fn set_reaches_every_tier() {
    let l1 = ProbeTier::new();
    let l2 = ProbeTier::new();
    let cache = TieredCache::new(vec![tier("l1", &l1), tier("l2", &l2)]).unwrap();

    cache.set("k", 11, Some(Duration::from_secs(30))).await;
    assert_eq!(l1.peek("k").await, Some(11));
    assert_eq!(l2.peek("k").await, Some(11));
}

#[tokio::test]
async fn failing_tier_does_not_block_the_others() {
    let l1 = ProbeTier::new();
    let l2 = ProbeTier::new();
    let l3 = ProbeTier::new();
    let cache = TieredCache::new(vec![tier("l1", &l1), tier("l2", &l2), tier("l3", &l3)]).unwrap();
    l2.break_it();

    cache.set("k", 4, None).await;

    assert_eq!(l2.sets(), 1);
    assert_eq!(l1.peek("k").await, Some(4));
    assert_eq!(l3.peek("k").await, Some(4));
}

#[tokio::test]
async fn delete_and_prefix_clear_fan_out() {
    let l1 = ProbeTier::new();
    let l2 = ProbeTier::new();
    let cache = TieredCache::new(vec![tier("l1", &l1), tier("l2", &l2)]).unwrap();

    cache.set("finance:a", 1, None).await;
    cache.set("finance:b", 2, None).await;
    cache.set("events:a", 3, None).await;

    cache.delete("finance:a").await;
    assert_eq!(cache.get("finance:a").await, None);

    cache.clear_by_prefix("finance:").await;
    assert_eq!(l1.peek("finance:b").await, None);
    assert_eq!(l2.peek("finance:b").await, None);
    assert_eq!(cache.get("events:a").await, Some(3));

    cache.clear_all().await;
    assert_eq!(cache.get("events:a").await, None);
}

#[tokio::test]
async fn stats_aggregate_tiers() {
    let l1 = ProbeTier::new();
    let l2 = ProbeTier::new();
    let cache = TieredCache::new(vec![tier("l1", &l1), tier("l2", &l2)]).unwrap();
    cache.set("a", 1, None).await;
    cache.set("b", 2, None).await;

    let stats = cache.stats().await;
    assert!(stats.available);
    assert_eq!(stats.entry_count, Some(4));
    assert_eq!(stats.tiers[0].name, "l1");

    l2.break_it();
    assert!(!cache.stats().await.available);
}
