//! Property tests for the rolling sample window.

use proptest::prelude::*;
use std::time::Duration;
use tiered_resilience_core::RollingWindow;

proptest! {
    /// Property: the average is the mean of the most recent `capacity` samples
    #[test]
    fn average_covers_only_recent_samples(
        capacity in 1usize..=32,
        samples in prop::collection::vec(0u64..=10_000, 0..200),
    ) {
        let mut window = RollingWindow::new(capacity);
        for &ms in &samples {
            window.push(Duration::from_millis(ms));
        }

        let recent = &samples[samples.len().saturating_sub(capacity)..];
        prop_assert_eq!(window.len(), recent.len());
        prop_assert!(window.len() <= capacity);

        if recent.is_empty() {
            prop_assert_eq!(window.average(), None);
        } else {
            let total: u64 = recent.iter().sum();
            let expected = Duration::from_millis(total) / recent.len() as u32;
            prop_assert_eq!(window.average(), Some(expected));
        }
    }
}
