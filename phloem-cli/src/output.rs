//! Results output formatting

use anyhow::{Context, Result};
use phloem_core::stats::{LatencySummary, OperationStats};
use phloem_core::threading::RunReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Results of one phase of an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResults {
    pub experiment: String,
    pub phase: String,
    pub backend: String,
    pub threads: usize,
    pub report: RunReport,
}

impl PhaseResults {
    pub fn new(
        experiment: impl Into<String>,
        phase: impl Into<String>,
        backend: impl Into<String>,
        threads: usize,
        report: RunReport,
    ) -> Self {
        Self {
            experiment: experiment.into(),
            phase: phase.into(),
            backend: backend.into(),
            threads,
            report,
        }
    }

    /// Print the YCSB-style summary to stdout
    pub fn print_human(&self) {
        print!("{self}");
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write results as JSON to `path`, or to stdout when no path is given
    pub fn write_json(&self, path: Option<&Path>) -> Result<()> {
        let json = self.to_json()?;
        match path {
            Some(path) => {
                let mut file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                file.write_all(json.as_bytes())?;
                file.write_all(b"\n")?;
                tracing::info!("Results written to: {}", path.display());
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}

fn write_latency(f: &mut fmt::Formatter<'_>, label: &str, latency: &LatencySummary) -> fmt::Result {
    writeln!(f, "[{label}], AverageLatency(us), {:.2}", latency.mean_us)?;
    writeln!(f, "[{label}], MinLatency(us), {}", latency.min_us)?;
    writeln!(f, "[{label}], MaxLatency(us), {}", latency.max_us)?;
    writeln!(f, "[{label}], 50thPercentileLatency(us), {}", latency.p50_us)?;
    writeln!(f, "[{label}], 95thPercentileLatency(us), {}", latency.p95_us)?;
    writeln!(f, "[{label}], 99thPercentileLatency(us), {}", latency.p99_us)?;
    writeln!(f, "[{label}], 99.9thPercentileLatency(us), {}", latency.p999_us)
}

fn write_operation(f: &mut fmt::Formatter<'_>, op: &OperationStats) -> fmt::Result {
    let label = op.kind.as_str();
    writeln!(f, "[{label}], Operations, {}", op.latency.count)?;
    write_latency(f, label, &op.latency)?;
    for (status, count) in &op.statuses {
        writeln!(f, "[{label}], Return={status}, {count}")?;
    }
    for bucket in op.buckets.iter().filter(|b| b.count > 0) {
        writeln!(f, "[{label}], <={}us, {}", bucket.upper_us, bucket.count)?;
    }
    Ok(())
}

impl fmt::Display for PhaseResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = &self.report.stats;
        writeln!(f, "# experiment: {}", self.experiment)?;
        writeln!(f, "# phase: {}, backend: {}, threads: {}", self.phase, self.backend, self.threads)?;
        writeln!(f, "[OVERALL], RunTime(ms), {:.0}", stats.runtime_ms)?;
        writeln!(f, "[OVERALL], Operations, {}", stats.total_operations)?;
        writeln!(f, "[OVERALL], Throughput(ops/sec), {:.2}", stats.throughput_ops)?;
        writeln!(f, "[OVERALL], Failures, {}", stats.failures)?;
        if stats.total_operations > 0 {
            write_latency(f, "OVERALL", &stats.overall)?;
        }
        if self.report.suppressed_failures > 0 {
            writeln!(f, "[OVERALL], SuppressedFailures, {}", self.report.suppressed_failures)?;
        }
        for op in &stats.operations {
            write_operation(f, op)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phloem_core::stats::{AggregatedStats, LatencyBucket};
    use phloem_core::threading::{WorkerExit, WorkerReport};
    use phloem_core::workload::OperationKind;
    use std::collections::BTreeMap;

    fn latency(count: u64) -> LatencySummary {
        LatencySummary {
            count,
            min_us: 3,
            max_us: 900,
            mean_us: 42.5,
            p50_us: 30,
            p95_us: 120,
            p99_us: 400,
            p999_us: 900,
        }
    }

    fn sample_results() -> PhaseResults {
        let read = OperationStats {
            kind: OperationKind::Read,
            latency: latency(90),
            statuses: BTreeMap::from([("OK".to_string(), 85), ("NOT_FOUND".to_string(), 5)]),
            buckets: vec![
                LatencyBucket { upper_us: 32, count: 40 },
                LatencyBucket { upper_us: 64, count: 0 },
                LatencyBucket { upper_us: 1024, count: 50 },
            ],
        };
        let delete = OperationStats {
            kind: OperationKind::Delete,
            latency: latency(10),
            statuses: BTreeMap::from([("NOT_IMPLEMENTED".to_string(), 10)]),
            buckets: vec![LatencyBucket { upper_us: 4, count: 10 }],
        };
        let report = RunReport {
            runtime_ms: 1000.0,
            workers: vec![WorkerReport {
                worker_id: 0,
                operations: 100,
                exit: WorkerExit::OperationLimit,
            }],
            suppressed_failures: 0,
            first_failure: None,
            stats: AggregatedStats {
                runtime_ms: 1000.0,
                total_operations: 100,
                throughput_ops: 100.0,
                failures: 0,
                overall: latency(100),
                operations: vec![read, delete],
            },
        };
        PhaseResults::new("unit", "run", "memory", 1, report)
    }

    #[test]
    fn test_text_report_lines() {
        let text = sample_results().to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines.contains(&"[OVERALL], RunTime(ms), 1000"));
        assert!(lines.contains(&"[OVERALL], Throughput(ops/sec), 100.00"));
        assert!(lines.contains(&"[READ], Operations, 90"));
        assert!(lines.contains(&"[READ], AverageLatency(us), 42.50"));
        assert!(lines.contains(&"[READ], 95thPercentileLatency(us), 120"));
        assert!(lines.contains(&"[READ], Return=OK, 85"));
        assert!(lines.contains(&"[READ], Return=NOT_FOUND, 5"));
        assert!(lines.contains(&"[READ], <=32us, 40"));
        assert!(lines.contains(&"[DELETE], Return=NOT_IMPLEMENTED, 10"));

        // Empty buckets are left out
        assert!(!lines.contains(&"[READ], <=64us, 0"));
        assert!(!text.contains("SuppressedFailures"));
    }

    #[test]
    fn test_json_report() {
        let results = sample_results();
        let json = results.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["phase"], "run");
        assert_eq!(parsed["report"]["stats"]["total_operations"], 100);
        assert_eq!(parsed["report"]["workers"][0]["exit"], "operation_limit");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        results.write_json(Some(&path)).unwrap();
        let back: PhaseResults =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.report.stats, results.report.stats);
    }
}
