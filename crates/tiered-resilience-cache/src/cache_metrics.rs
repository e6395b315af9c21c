//! Lookup counters and latency estimates for a tiered cache.

use serde::Serialize;

/// Weight given to a new sample in the p50 moving average.
const P50_ALPHA: f64 = 0.1;
/// Per-sample decay applied to the p95 estimate before comparing with a new sample.
const P95_DECAY: f64 = 0.99;

/// Counters updated by every [`TieredCache::get`].
///
/// `latency_p50` and `latency_p95` are in milliseconds and are cheap
/// exponential estimates, not histogram percentiles:
/// `p50 = 0.1 * sample + 0.9 * p50` and `p95 = max(sample, 0.99 * p95)`.
/// The first sample seeds both.
///
/// [`TieredCache::get`]: crate::TieredCache::get
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub last_hit_tier: Option<String>,
    pub latency_p50: Option<f64>,
    pub latency_p95: Option<f64>,
}

impl CacheMetrics {
    /// Fraction of lookups that hit some tier, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub(crate) fn record_hit(&mut self, tier: &str, latency_ms: f64) {
        self.hits += 1;
        self.last_hit_tier = Some(tier.to_string());
        self.observe_latency(latency_ms);
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub(crate) fn record_error(&mut self) {
        self.errors += 1;
    }

    fn observe_latency(&mut self, sample: f64) {
        self.latency_p50 = Some(match self.latency_p50 {
            Some(p50) => P50_ALPHA * sample + (1.0 - P50_ALPHA) * p50,
            None => sample,
        });
        self.latency_p95 = Some(match self.latency_p95 {
            Some(p95) => sample.max(P95_DECAY * p95),
            None => sample,
        });
    }
}
