//! Measurement collection and aggregation

use crate::db::Status;
use crate::workload::OperationKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub mod analysis;
pub mod collector;

pub use analysis::{latency_buckets, summarize};
pub use collector::Measurements;

/// Outcome of one timed dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub kind: OperationKind,
    pub latency: Duration,
    pub status: Status,
}

impl Sample {
    pub fn new(kind: OperationKind, latency: Duration, status: Status) -> Self {
        Self { kind, latency, status }
    }
}

/// Latency distribution summary, microseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub mean_us: f64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub p999_us: u64,
}

/// Samples whose latency fell in `(previous upper bound, upper_us]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyBucket {
    pub upper_us: u64,
    pub count: u64,
}

/// Statistics for one operation kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub kind: OperationKind,
    #[serde(flatten)]
    pub latency: LatencySummary,
    /// Outcome counts keyed by status name (`OK`, `NOT_FOUND`, ...)
    pub statuses: BTreeMap<String, u64>,
    /// Log-scale latency histogram
    pub buckets: Vec<LatencyBucket>,
}

impl OperationStats {
    pub fn status_count(&self, status: Status) -> u64 {
        self.statuses.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn failures(&self) -> u64 {
        Status::ALL
            .iter()
            .filter(|s| s.is_failure())
            .map(|s| self.status_count(*s))
            .sum()
    }
}

/// Aggregated statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedStats {
    pub runtime_ms: f64,
    pub total_operations: u64,
    pub throughput_ops: f64,
    /// ERROR plus BAD_REQUEST across all kinds
    pub failures: u64,
    pub overall: LatencySummary,
    /// Kinds with at least one sample, in mix order
    pub operations: Vec<OperationStats>,
}

impl AggregatedStats {
    pub fn operation(&self, kind: OperationKind) -> Option<&OperationStats> {
        self.operations.iter().find(|op| op.kind == kind)
    }

    /// Count of `status` outcomes across every kind
    pub fn status_total(&self, status: Status) -> u64 {
        self.operations.iter().map(|op| op.status_count(status)).sum()
    }
}
