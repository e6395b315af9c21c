//! Bounded window of duration samples.

use std::collections::VecDeque;
use std::time::Duration;

/// Keeps the most recent `capacity` samples and a running sum so the
/// average is O(1).
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<Duration>,
    capacity: usize,
    sum: Duration,
}

impl RollingWindow {
    /// Creates an empty window. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: Duration::ZERO,
        }
    }

    /// Records a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: Duration) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum = self.sum.saturating_sub(oldest);
            }
        }
        self.samples.push_back(sample);
        self.sum = self.sum.saturating_add(sample);
    }

    /// Mean of the retained samples, or `None` if empty.
    pub fn average(&self) -> Option<Duration> {
        let n = u32::try_from(self.samples.len()).ok().filter(|n| *n > 0)?;
        Some(self.sum / n)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = Duration::ZERO;
    }
}
