//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - The circuit opens exactly when the failure count reaches the threshold
//! - Once open, no operation runs until the reset timeout passes
//! - Counters agree with what the callers observed

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tiered_resilience_circuitbreaker::{CircuitBreaker, CircuitState, FailureCountPolicy};
use tokio::runtime::Runtime;

/// Expected behaviour, computed without the breaker.
struct Model {
    threshold: usize,
    consecutive: bool,
    failures: usize,
    open: bool,
    ran: usize,
    rejected: usize,
}

impl Model {
    /// Returns whether the operation would run.
    fn call(&mut self, succeeds: bool) -> bool {
        if self.open {
            self.rejected += 1;
            return false;
        }
        self.ran += 1;
        if succeeds {
            if self.consecutive {
                self.failures = 0;
            }
        } else {
            self.failures += 1;
            if self.failures >= self.threshold {
                self.open = true;
            }
        }
        true
    }
}

fn policies() -> impl Strategy<Value = FailureCountPolicy> {
    prop_oneof![
        Just(FailureCountPolicy::SinceReset),
        Just(FailureCountPolicy::Consecutive),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: the breaker matches the reference model call by call
    #[test]
    fn breaker_follows_the_model(
        threshold in 1usize..=6,
        policy in policies(),
        outcomes in prop::collection::vec(any::<bool>(), 0..80),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let cb = CircuitBreaker::builder()
                .failure_threshold(threshold)
                .failure_count_policy(policy)
                .build()
                .unwrap();
            let mut model = Model {
                threshold,
                consecutive: policy == FailureCountPolicy::Consecutive,
                failures: 0,
                open: false,
                ran: 0,
                rejected: 0,
            };
            let invoked = AtomicUsize::new(0);

            for &succeeds in &outcomes {
                let ran = model.call(succeeds);
                let result = cb
                    .execute(|| async {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        if succeeds { Ok(()) } else { Err("down") }
                    })
                    .await;
                prop_assert_eq!(result.is_ok(), ran && succeeds);
                if !ran {
                    prop_assert!(result.unwrap_err().is_circuit_open());
                }
                prop_assert_eq!(cb.is_open(), model.open);
            }

            let stats = cb.stats();
            prop_assert_eq!(invoked.load(Ordering::SeqCst), model.ran);
            prop_assert_eq!(stats.total_calls as usize, model.ran);
            prop_assert_eq!(stats.rejected as usize, model.rejected);
            Ok(())
        })?;
    }

    /// Property: reset always yields a closed breaker with zeroed counters
    #[test]
    fn reset_always_closes(
        threshold in 1usize..=4,
        outcomes in prop::collection::vec(any::<bool>(), 0..30),
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let cb = CircuitBreaker::builder()
                .failure_threshold(threshold)
                .build()
                .unwrap();
            for succeeds in outcomes {
                let _ = cb
                    .execute(|| async move { if succeeds { Ok(()) } else { Err("down") } })
                    .await;
            }
            cb.reset();
            let stats = cb.stats();
            prop_assert_eq!(stats.state, CircuitState::Closed);
            prop_assert_eq!(stats.total_calls, 0);
            prop_assert_eq!(stats.rejected, 0);
            prop_assert_eq!(stats.current_failures, 0);
            Ok(())
        })?;
    }
}
