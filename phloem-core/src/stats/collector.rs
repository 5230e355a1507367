//! Shared measurement sink

use super::analysis::{latency_buckets, summarize};
use super::{AggregatedStats, OperationStats, Sample};
use crate::db::Status;
use crate::workload::OperationKind;
use crate::{Error, Result};
use hdrhistogram::Histogram;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Highest trackable latency, one hour in microseconds; longer samples saturate
const MAX_LATENCY_US: u64 = 3_600_000_000;

/// Significant figures kept by every histogram
const HDR_SIGFIGS: u8 = 3;

const KINDS: usize = OperationKind::ALL.len();
const STATUSES: usize = Status::ALL.len();

/// Per-kind latency histograms and per-kind, per-status outcome counters
///
/// Shared by every worker through an `Arc`. Each kind's histogram sits behind
/// its own lock, so workers recording different kinds never contend, and
/// recording never allocates. The counters are plain atomics so progress can be
/// read without touching any lock.
#[derive(Debug)]
pub struct Measurements {
    histograms: [Mutex<Histogram<u64>>; KINDS],
    counts: [[AtomicU64; STATUSES]; KINDS],
}

impl Measurements {
    pub fn new() -> Result<Self> {
        let mut histograms = Vec::with_capacity(KINDS);
        for _ in 0..KINDS {
            let hist = Histogram::<u64>::new_with_max(MAX_LATENCY_US, HDR_SIGFIGS)
                .map_err(|e| Error::Other(format!("failed to create histogram: {e:?}")))?;
            histograms.push(Mutex::new(hist));
        }
        let histograms: [Mutex<Histogram<u64>>; KINDS] = histograms
            .try_into()
            .map_err(|_| Error::Other("histogram count mismatch".into()))?;

        Ok(Self {
            histograms,
            counts: std::array::from_fn(|_| std::array::from_fn(|_| AtomicU64::new(0))),
        })
    }

    pub fn record(&self, sample: Sample) {
        let latency_us = u64::try_from(sample.latency.as_micros()).unwrap_or(u64::MAX);
        {
            let mut hist = self.histograms[sample.kind.index()]
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            hist.saturating_record(latency_us);
        }
        self.counts[sample.kind.index()][sample.status.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Samples recorded so far, across all kinds
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// Samples recorded for `kind`
    pub fn count(&self, kind: OperationKind) -> u64 {
        self.counts[kind.index()].iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn status_count(&self, kind: OperationKind, status: Status) -> u64 {
        self.counts[kind.index()][status.index()].load(Ordering::Relaxed)
    }

    /// Summarize everything recorded so far
    ///
    /// `runtime` is the wall-clock span the samples were collected over.
    pub fn snapshot(&self, runtime: Duration) -> AggregatedStats {
        let mut overall: Option<Histogram<u64>> = None;
        let mut operations = Vec::new();
        let mut failures = 0;

        for kind in OperationKind::ALL {
            let hist = self.histograms[kind.index()]
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if hist.is_empty() {
                continue;
            }

            let mut statuses = BTreeMap::new();
            for status in Status::ALL {
                let count = self.status_count(kind, status);
                if count > 0 {
                    statuses.insert(status.as_str().to_string(), count);
                    if status.is_failure() {
                        failures += count;
                    }
                }
            }

            operations.push(OperationStats {
                kind,
                latency: summarize(&hist),
                statuses,
                buckets: latency_buckets(&hist),
            });

            match overall.as_mut() {
                Some(merged) => {
                    if let Err(e) = merged.add(&hist) {
                        debug!("Cannot merge {} latencies into the overall histogram: {}", kind, e);
                    }
                }
                None => overall = Some(hist),
            }
        }

        let overall = overall.as_ref().map(summarize).unwrap_or_default();
        let secs = runtime.as_secs_f64();
        AggregatedStats {
            runtime_ms: secs * 1000.0,
            total_operations: overall.count,
            throughput_ops: if secs > 0.0 { overall.count as f64 / secs } else { 0.0 },
            failures,
            overall,
            operations,
        }
    }
}
