//! Per-query latency histogram.

use crate::Result;
use hdrhistogram::Histogram;

/// Nanosecond latencies with three significant digits.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    inner: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create an empty, auto-resizing histogram.
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: Histogram::new(3)?,
        })
    }

    /// Record one latency, growing the range as needed.
    ///
    /// Only values the histogram cannot grow to cover are clamped.
    #[inline]
    pub fn record(&mut self, latency_ns: u64) {
        if self.inner.record(latency_ns).is_err() {
            self.inner.saturating_record(latency_ns);
        }
    }

    /// Number of recorded latencies.
    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Mean latency in nanoseconds.
    pub fn mean(&self) -> f64 {
        self.inner.mean()
    }

    /// Latency at `quantile` (0.0 to 1.0).
    pub fn quantile(&self, quantile: f64) -> u64 {
        self.inner.value_at_quantile(quantile)
    }

    /// Largest recorded latency.
    pub fn max(&self) -> u64 {
        self.inner.max()
    }

    /// `(latency_ns, count)` for every distinct recorded bucket, ascending.
    pub fn buckets(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.inner
            .iter_recorded()
            .map(|v| (v.value_iterated_to(), v.count_at_value()))
    }

    /// One-line percentile summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "p50 {} ns, p90 {} ns, p99 {} ns, p99.9 {} ns, max {} ns",
            self.quantile(0.50),
            self.quantile(0.90),
            self.quantile(0.99),
            self.quantile(0.999),
            self.max()
        )
    }
}
