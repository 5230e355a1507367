//! Statistical analysis of recorded latencies

use super::{LatencyBucket, LatencySummary};
use hdrhistogram::Histogram;

/// Percentiles, extremes and mean of a latency histogram
pub fn summarize(hist: &Histogram<u64>) -> LatencySummary {
    if hist.is_empty() {
        return LatencySummary::default();
    }
    LatencySummary {
        count: hist.len(),
        min_us: hist.min(),
        max_us: hist.max(),
        mean_us: hist.mean(),
        p50_us: hist.value_at_quantile(0.50),
        p95_us: hist.value_at_quantile(0.95),
        p99_us: hist.value_at_quantile(0.99),
        p999_us: hist.value_at_quantile(0.999),
    }
}

/// Power-of-two latency buckets, starting at 1us, up to the highest recorded value
///
/// Empty buckets between populated ones are kept so the series is contiguous.
pub fn latency_buckets(hist: &Histogram<u64>) -> Vec<LatencyBucket> {
    if hist.is_empty() {
        return Vec::new();
    }
    hist.iter_log(1, 2.0)
        .map(|v| LatencyBucket {
            upper_us: v.value_iterated_to(),
            count: v.count_since_last_iteration(),
        })
        .collect()
}
