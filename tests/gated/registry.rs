use std::time::Duration;
use tiered_resilience::circuitbreaker::CircuitState;
use tiered_resilience::{
    BulkheadOverride, CircuitBreakerOverride, ResilienceError, ResilienceRegistry,
    ResilienceSettings,
};
use tokio::sync::oneshot;

fn registry() -> ResilienceRegistry {
    let mut settings = ResilienceSettings::default();
    settings.bulkheads.insert(
        "finance".into(),
        BulkheadOverride {
            max_concurrent: Some(1),
            queue_size: Some(0),
            ..Default::default()
        },
    );
    settings.circuit_breakers.insert(
        "events".into(),
        CircuitBreakerOverride {
            failure_threshold: Some(2),
            timeout_ms: Some(50),
            ..Default::default()
        },
    );
    ResilienceRegistry::new(settings).unwrap()
}

#[tokio::test]
async fn gates_for_one_name_share_capacity() {
    let registry = registry();
    let first = registry.gate("finance").unwrap();
    let second = registry.gate("finance").unwrap();

    let (release, hold) = oneshot::channel::<()>();
    let running = {
        let gate = first.clone();
        tokio::spawn(async move {
            gate.call(|| async move {
                let _ = hold.await;
                Ok::<_, String>(())
            })
            .await
        })
    };
    while second.bulkhead().stats().active == 0 {
        tokio::task::yield_now().await;
    }

    let err = second.call(|| async { Ok::<_, String>(()) }).await.unwrap_err();
    assert!(matches!(
        err,
        ResilienceError::QueueFull {
            active: 1,
            queue_size: 0
        }
    ));
    // shed calls never reach the breaker
    assert_eq!(second.circuit_breaker().stats().total_calls, 0);

    release.send(()).unwrap();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn subsystems_fail_independently() {
    let registry = registry();
    let events = registry.gate("events").unwrap();
    let finance = registry.gate("finance").unwrap();

    for _ in 0..2 {
        let err = events.call(|| async { Err::<(), _>("feed down") }).await.unwrap_err();
        assert_eq!(err.application_error(), Some("feed down"));
    }
    assert_eq!(events.circuit_breaker().state(), CircuitState::Open);

    let err = events.call(|| async { Ok::<_, &str>(()) }).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(finance.call(|| async { Ok::<_, &str>(5) }).await.unwrap(), 5);

    registry.reset_circuit_breakers();
    assert_eq!(events.call(|| async { Ok::<_, &str>(6) }).await.unwrap(), 6);
}

#[tokio::test]
async fn breaker_timeout_surfaces_with_its_layer() {
    let registry = registry();
    let events = registry.gate("events").unwrap();

    let err = events
        .call(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, String>(())
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ResilienceError::Timeout {
            layer: "circuit_breaker"
        }
    ));
    assert_eq!(events.bulkhead().stats().active, 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_calls_open_the_circuit_under_a_short_bulkhead_timeout() {
    let settings = ResilienceSettings::from_toml(
        r#"
        [bulkheads.search]
        timeout_ms = 100

        [circuit_breakers.search]
        failure_threshold = 2
        reset_timeout_ms = 1000
        half_open_max_calls = 1
        "#,
    )
    .unwrap();
    assert_eq!(settings.circuit_breaker_for("search").timeout_ms, 10_000);
    let registry = ResilienceRegistry::new(settings).unwrap();
    let search = registry.gate("search").unwrap();

    let hang = || async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok::<_, String>(())
    };

    for _ in 0..2 {
        let err = search.call(hang).await.unwrap_err();
        assert!(matches!(err, ResilienceError::Timeout { layer: "bulkhead" }));
    }
    assert_eq!(search.circuit_breaker().state(), CircuitState::Open);
    assert_eq!(search.circuit_breaker().stats().failures, 2);

    let err = search.call(hang).await.unwrap_err();
    assert!(err.is_circuit_open());

    // the trial call hangs too, so the circuit reopens
    tokio::time::advance(Duration::from_millis(1_100)).await;
    let err = search.call(hang).await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(search.circuit_breaker().state(), CircuitState::Open);
    assert_eq!(search.bulkhead().stats().active, 0);
}

#[tokio::test]
async fn snapshot_serializes_every_instance() {
    let registry = registry();
    registry
        .gate("finance")
        .unwrap()
        .call(|| async { Ok::<_, String>(()) })
        .await
        .unwrap();
    registry.circuit_breaker("events").unwrap();

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.bulkheads["finance"].completed, 1);
    assert_eq!(snapshot.bulkheads["finance"].max_concurrent, 1);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["circuit_breakers"]["events"]["state"], "Closed");
    assert_eq!(json["circuit_breakers"]["finance"]["total_calls"], 1);
}

#[test]
fn invalid_override_is_rejected_up_front() {
    let mut settings = ResilienceSettings::default();
    settings.bulkheads.insert(
        "reports".into(),
        BulkheadOverride {
            max_concurrent: Some(0),
            ..Default::default()
        },
    );
    let err = ResilienceRegistry::new(settings).unwrap_err();
    assert!(err.to_string().contains("max_concurrent"));
}
