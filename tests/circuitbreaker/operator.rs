use super::{RESET_TIMEOUT, breaker, fail, succeed};
use std::time::Duration;
use tiered_resilience_circuitbreaker::CircuitState;

#[tokio::test]
async fn reset_is_idempotent() {
    let cb = breaker(2, 1);
    fail(&cb).await;
    fail(&cb).await;
    assert!(cb.is_open());

    cb.reset();
    let first = cb.stats();
    cb.reset();
    let second = cb.stats();

    assert_eq!(cb.state(), CircuitState::Closed);
    for stats in [&first, &second] {
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.current_failures, 0);
        assert_eq!(stats.last_failure_time, None);
    }
    assert_eq!(succeed(&cb).await.unwrap(), 1);
}

#[tokio::test]
async fn force_open_rejects_and_force_closed_keeps_stats() {
    let cb = breaker(10, 1);
    succeed(&cb).await.unwrap();
    fail(&cb).await;

    cb.force_open();
    assert!(cb.is_open());
    assert!(fail(&cb).await.is_circuit_open());
    assert_eq!(cb.http_status(), 503);
    assert_eq!(cb.health_status(), "unhealthy");

    cb.force_closed();
    assert_eq!(cb.state(), CircuitState::Closed);
    assert_eq!(cb.http_status(), 200);
    assert_eq!(cb.health_status(), "healthy");

    let stats = cb.stats();
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(succeed(&cb).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn forced_open_half_opens_like_any_open_circuit() {
    let cb = breaker(10, 1);
    cb.force_open();

    tokio::time::advance(RESET_TIMEOUT / 2).await;
    // forcing again restarts the timer
    cb.force_open();
    tokio::time::advance(RESET_TIMEOUT / 2 + Duration::from_secs(1)).await;
    assert!(fail(&cb).await.is_circuit_open());

    tokio::time::advance(RESET_TIMEOUT).await;
    succeed(&cb).await.unwrap();
    assert_eq!(cb.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn half_open_reports_degraded() {
    let cb = breaker(1, 2);
    fail(&cb).await;
    tokio::time::advance(RESET_TIMEOUT + Duration::from_millis(1)).await;
    succeed(&cb).await.unwrap();

    assert_eq!(cb.state(), CircuitState::HalfOpen);
    assert_eq!(cb.health_status(), "degraded");
    assert_eq!(cb.http_status(), 200);
}

#[tokio::test]
async fn stats_rates_and_timings() {
    let cb = breaker(10, 1);
    for _ in 0..3 {
        succeed(&cb).await.unwrap();
    }
    fail(&cb).await;

    let stats = cb.stats();
    assert_eq!(stats.name, "ledger");
    assert_eq!(stats.total_calls, 4);
    assert_eq!(stats.failure_rate, 0.25);
    assert_eq!(stats.current_failures, 1);
    assert!(stats.avg_response_time.is_some());
    assert!(stats.last_failure_time.is_some());
}

#[tokio::test]
async fn fresh_breaker_has_empty_stats() {
    let cb = breaker(1, 1);
    let stats = cb.stats();
    assert_eq!(stats.failure_rate, 0.0);
    assert_eq!(stats.avg_response_time, None);
    assert_eq!(cb.health_status(), "healthy");
}
