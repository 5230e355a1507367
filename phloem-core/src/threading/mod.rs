//! Threading runtime and worker management
//!
//! Uses native OS threads (std::thread): one thread per worker, one backend
//! instance per thread, blocking dispatch.

use crate::config::RateModel;
use crate::db::{Db, DbFactory, Properties};
use crate::scheduler::worker_policy;
use crate::stats::{AggregatedStats, Measurements};
use crate::workload::Workload;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub mod barrier;
pub mod cancel;
pub mod reporter;
pub mod worker;

pub use barrier::Barrier;
pub use cancel::CancellationToken;
pub use reporter::StatusReporter;
pub use worker::{
    dispatch, dispatch_guarded, FailureLog, Worker, WorkerExit, WorkerLimits, WorkerReport,
    WorkerShared, WorkerState,
};

/// When a run ends; whichever limit is reached first wins
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunLimit {
    /// Total operations across all workers
    pub operations: Option<u64>,
    /// Wall-clock duration
    pub duration: Option<Duration>,
}

impl RunLimit {
    pub fn operations(count: u64) -> Self {
        Self { operations: Some(count), duration: None }
    }

    pub fn duration(duration: Duration) -> Self {
        Self { operations: None, duration: Some(duration) }
    }

    pub fn validate(&self) -> Result<()> {
        if self.operations.is_none() && self.duration.is_none() {
            return Err(Error::config(
                "a run needs an operation count or a maximum execution time",
            ));
        }
        Ok(())
    }
}

/// Executor settings
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub threads: usize,
    pub limit: RunLimit,
    /// Total operations per second across all workers; `None` runs closed loop
    pub target_throughput: Option<f64>,
    pub rate_model: RateModel,
    /// Progress log period; `None` disables the reporter
    pub status_interval: Option<Duration>,
    /// Table name passed to every backend call
    pub table: String,
    /// Master seed for rate policies
    pub seed: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            limit: RunLimit::default(),
            target_throughput: None,
            rate_model: RateModel::default(),
            status_interval: None,
            table: "usertable".to_string(),
            seed: None,
        }
    }
}

/// Outcome of one executor run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub runtime_ms: f64,
    pub workers: Vec<WorkerReport>,
    /// Escaped dispatch failures after the first (which was logged)
    pub suppressed_failures: u64,
    pub first_failure: Option<String>,
    pub stats: AggregatedStats,
}

impl RunReport {
    pub fn total_operations(&self) -> u64 {
        self.workers.iter().map(|w| w.operations).sum()
    }

    pub fn runtime(&self) -> Duration {
        Duration::from_secs_f64(self.runtime_ms / 1000.0)
    }
}

/// Split `total` operations across `threads` workers
///
/// Every worker gets `total / threads`; the first `total % threads` get one more,
/// so the shares always add up to `total`.
pub fn split_operations(total: u64, threads: usize) -> Vec<u64> {
    let threads = threads.max(1) as u64;
    let base = total / threads;
    let extra = total % threads;
    (0..threads).map(|i| base + u64::from(i < extra)).collect()
}

/// Fixed pool of workers driving one backend per thread
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        if config.threads == 0 {
            return Err(Error::config("thread count must be > 0"));
        }
        config.limit.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run the workload to completion
    ///
    /// All backend instances are created and initialized on the calling thread
    /// before any worker starts. If one fails, the instances already initialized
    /// are cleaned up and the error is returned with no sample recorded.
    pub fn run(
        &self,
        factory: &dyn DbFactory,
        properties: &Properties,
        workload: Arc<Workload>,
        measurements: Arc<Measurements>,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let threads = self.config.threads;
        factory.validate(properties)?;

        let mut policies = Vec::with_capacity(threads);
        for worker_id in 0..threads {
            policies.push(worker_policy(
                self.config.target_throughput,
                self.config.rate_model,
                threads,
                worker_id,
                self.config.seed,
            )?);
        }

        let dbs = init_backends(factory, properties, threads)?;
        info!("Initialized {} {} backend instance(s)", threads, factory.name());

        let quotas: Vec<Option<u64>> = match self.config.limit.operations {
            Some(total) => split_operations(total, threads).into_iter().map(Some).collect(),
            None => vec![None; threads],
        };

        let reporter = match self.config.status_interval {
            Some(interval) => match StatusReporter::spawn(interval, Arc::clone(&measurements)) {
                Ok(reporter) => Some(reporter),
                Err(e) => {
                    warn!("Status reporter not started: {}", e);
                    None
                }
            },
            None => None,
        };

        let failures = FailureLog::new();
        let shared = WorkerShared {
            workload: &workload,
            measurements: &measurements,
            cancel,
            failures: &failures,
            table: &self.config.table,
        };
        let barrier = Barrier::new(threads);
        let start = Instant::now();
        let deadline = self.config.limit.duration.map(|d| start + d);

        let joined: Vec<thread::Result<WorkerReport>> = thread::scope(|scope| {
            let handles: Vec<_> = dbs
                .into_iter()
                .zip(policies)
                .zip(quotas)
                .enumerate()
                .map(|(worker_id, ((db, policy), quota))| {
                    let barrier = barrier.clone();
                    let shared = &shared;
                    let limits = WorkerLimits { operations: quota, deadline };
                    scope.spawn(move || {
                        let mut worker = Worker::new(worker_id, db, policy, limits);
                        barrier.wait();
                        let report = worker.run(shared);
                        worker.cleanup();
                        report
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });
        let runtime = start.elapsed();

        if let Some(reporter) = reporter {
            reporter.stop();
        }

        let mut workers = Vec::with_capacity(threads);
        for (worker_id, result) in joined.into_iter().enumerate() {
            match result {
                Ok(report) => workers.push(report),
                Err(e) => {
                    return Err(Error::Other(format!("Worker {worker_id} panicked: {e:?}")));
                }
            }
        }

        let report = RunReport {
            runtime_ms: runtime.as_secs_f64() * 1000.0,
            suppressed_failures: failures.suppressed(),
            first_failure: failures.first(),
            stats: measurements.snapshot(runtime),
            workers,
        };
        info!(
            "Run finished: {} operations in {:.3}s",
            report.total_operations(),
            runtime.as_secs_f64()
        );
        Ok(report)
    }
}

/// Create and initialize one backend per worker, all or nothing
fn init_backends(
    factory: &dyn DbFactory,
    properties: &Properties,
    count: usize,
) -> Result<Vec<Box<dyn Db>>> {
    let mut dbs: Vec<Box<dyn Db>> = Vec::with_capacity(count);
    for worker_id in 0..count {
        let created = factory.create().and_then(|mut db| match db.init(properties) {
            Ok(()) => Ok(db),
            Err(e) => {
                if let Err(cleanup) = db.cleanup() {
                    debug!("Cleanup after failed init also failed: {}", cleanup);
                }
                Err(e)
            }
        });
        match created {
            Ok(db) => dbs.push(db),
            Err(e) => {
                warn!(
                    "Backend {} failed to initialize for worker {}: {}",
                    factory.name(),
                    worker_id,
                    e
                );
                for mut db in dbs {
                    if let Err(cleanup) = db.cleanup() {
                        debug!("Cleanup of initialized backend failed: {}", cleanup);
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(dbs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_operations() {
        assert_eq!(split_operations(1000, 4), vec![250; 4]);
        assert_eq!(split_operations(10, 4), vec![3, 3, 2, 2]);
        assert_eq!(split_operations(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_operations(7, 1), vec![7]);
    }

    #[test]
    fn test_run_limit_requires_a_bound() {
        assert!(RunLimit::default().validate().is_err());
        assert!(RunLimit::operations(0).validate().is_ok());
        assert!(RunLimit::duration(Duration::from_secs(1)).validate().is_ok());
    }

    #[test]
    fn test_executor_config_validation() {
        let config = ExecutorConfig {
            threads: 0,
            limit: RunLimit::operations(10),
            ..Default::default()
        };
        assert!(matches!(Executor::new(config), Err(Error::Config(_))));

        let config = ExecutorConfig::default();
        assert!(matches!(Executor::new(config), Err(Error::Config(_))));
    }
}
