//! Worker implementation
//!
//! One worker per OS thread, one backend instance per worker. A worker repeatedly
//! checks its limits, waits for its rate slot, asks the shared workload for the
//! next operation, dispatches it synchronously and records one sample. An
//! operation that fails never stops the worker; only a lost connection, a
//! workload error, a limit or cancellation does.

use super::cancel::CancellationToken;
use crate::db::{Db, Status};
use crate::scheduler::Policy;
use crate::stats::{Measurements, Sample};
use crate::timing::{sleep_until, time_ns};
use crate::workload::{Operation, OperationKind, WorkerContext, Workload};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Init,
    Running,
    RateWait,
    Done,
}

/// Why a worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerExit {
    /// Completed its share of the operation count
    OperationLimit,
    /// The run deadline passed
    TimeLimit,
    Cancelled,
    /// The workload has no more operations
    Exhausted,
    /// The backend reported an unrecoverable connection failure
    ConnectionLost,
    /// The workload failed to produce an operation
    WorkloadError,
}

/// Per-worker outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub operations: u64,
    pub exit: WorkerExit,
}

/// Escaped dispatch failures, shared by every worker of a run
///
/// The first failure is logged at WARN with its message; later ones are only
/// counted (and logged at DEBUG) so a failing backend cannot flood the log.
#[derive(Debug, Default)]
pub struct FailureLog {
    logged: AtomicBool,
    suppressed: AtomicU64,
    first: Mutex<Option<String>>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, worker_id: usize, kind: OperationKind, message: &str) {
        if !self.logged.swap(true, Ordering::AcqRel) {
            warn!(
                "Worker {} {} failed: {} (further failures are counted, not logged)",
                worker_id, kind, message
            );
            if let Ok(mut first) = self.first.lock() {
                *first = Some(format!("{kind}: {message}"));
            }
        } else {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!("Worker {} {} failed: {}", worker_id, kind, message);
        }
    }

    /// Failures seen after the first one
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Message of the first failure, if any
    pub fn first(&self) -> Option<String> {
        self.first.lock().ok().and_then(|first| first.clone())
    }
}

/// Limits applied to one worker
#[derive(Debug, Clone, Copy)]
pub struct WorkerLimits {
    /// This worker's share of the operation count
    pub operations: Option<u64>,
    /// Shared wall-clock deadline
    pub deadline: Option<Instant>,
}

/// Shared run state every worker borrows
pub struct WorkerShared<'a> {
    pub workload: &'a Workload,
    pub measurements: &'a Measurements,
    pub cancel: &'a CancellationToken,
    pub failures: &'a FailureLog,
    pub table: &'a str,
}

/// Drives one backend instance
pub struct Worker {
    id: usize,
    db: Box<dyn Db>,
    policy: Box<dyn Policy>,
    limits: WorkerLimits,
    state: WorkerState,
    operations: u64,
}

impl Worker {
    pub fn new(
        id: usize,
        db: Box<dyn Db>,
        policy: Box<dyn Policy>,
        limits: WorkerLimits,
    ) -> Self {
        Self { id, db, policy, limits, state: WorkerState::Init, operations: 0 }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run until a limit, cancellation, exhaustion or a lost connection
    pub fn run(&mut self, shared: &WorkerShared<'_>) -> WorkerReport {
        let mut ctx = shared.workload.worker_context(self.id);
        self.state = WorkerState::Running;
        debug!("Worker {} running with {} policy", self.id, self.policy.name());

        let exit = self.run_loop(shared, &mut ctx);

        self.state = WorkerState::Done;
        debug!("Worker {} done after {} operations: {:?}", self.id, self.operations, exit);
        WorkerReport { worker_id: self.id, operations: self.operations, exit }
    }

    fn run_loop(&mut self, shared: &WorkerShared<'_>, ctx: &mut WorkerContext) -> WorkerExit {
        loop {
            if let Some(exit) = self.check_limits(shared.cancel) {
                return exit;
            }

            if let Some(send_at) = self.policy.next_send_time(time_ns()) {
                if send_at > time_ns() {
                    self.state = WorkerState::RateWait;
                    let deadline = self.limits.deadline;
                    let waited = sleep_until(send_at, || {
                        shared.cancel.is_cancelled()
                            || deadline.is_some_and(|d| Instant::now() >= d)
                    });
                    self.state = WorkerState::Running;
                    if !waited {
                        continue;
                    }
                }
            }

            let op = match shared.workload.next_operation(ctx) {
                Ok(Some(op)) => op,
                Ok(None) => return WorkerExit::Exhausted,
                Err(e) => {
                    error!("Worker {} cannot generate operations: {}", self.id, e);
                    return WorkerExit::WorkloadError;
                }
            };

            self.policy.on_request_sent(time_ns());
            let kind = op.kind();
            let start = Instant::now();
            let outcome = dispatch_guarded(self.db.as_mut(), shared.table, &op);
            let latency = start.elapsed();

            let (status, lost_connection) = match outcome {
                Ok(status) => (status, false),
                Err(failure) => {
                    shared.failures.record(self.id, kind, &failure.message);
                    (Status::Error, failure.connection_lost)
                }
            };
            shared.measurements.record(Sample::new(kind, latency, status));
            self.operations += 1;

            if lost_connection {
                error!("Worker {} lost its backend connection, stopping", self.id);
                return WorkerExit::ConnectionLost;
            }
        }
    }

    fn check_limits(&self, cancel: &CancellationToken) -> Option<WorkerExit> {
        if cancel.is_cancelled() {
            return Some(WorkerExit::Cancelled);
        }
        if self.limits.operations.is_some_and(|quota| self.operations >= quota) {
            return Some(WorkerExit::OperationLimit);
        }
        if self.limits.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Some(WorkerExit::TimeLimit);
        }
        None
    }

    /// Release the backend; failures are logged, not propagated
    pub fn cleanup(&mut self) {
        if let Err(e) = self.db.cleanup() {
            warn!("Worker {} backend cleanup failed: {}", self.id, e);
        }
    }
}

/// A dispatch that did not produce a status
#[derive(Debug)]
pub struct DispatchFailure {
    pub message: String,
    pub connection_lost: bool,
}

/// Dispatch with errors and panics converted into a [`DispatchFailure`]
pub fn dispatch_guarded(
    db: &mut dyn Db,
    table: &str,
    op: &Operation,
) -> std::result::Result<Status, DispatchFailure> {
    match catch_unwind(AssertUnwindSafe(|| dispatch(db, table, op))) {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => {
            Err(DispatchFailure { connection_lost: e.is_connection(), message: e.to_string() })
        }
        Err(panic) => Err(DispatchFailure {
            message: format!("backend panicked: {}", panic_message(panic.as_ref())),
            connection_lost: false,
        }),
    }
}

/// Route one operation to the matching backend call
///
/// [`Operation::Unavailable`] never reaches the backend and counts as NOT_FOUND.
pub fn dispatch(db: &mut dyn Db, table: &str, op: &Operation) -> Result<Status> {
    match op {
        Operation::Read { key, fields } => {
            db.read(table, key, fields.as_deref()).map(|(status, _)| status)
        }
        Operation::Update { key, values } => db.update(table, key, values),
        Operation::Insert { key, values } => db.insert(table, key, values),
        Operation::Scan { start_key, count, fields } => {
            db.scan(table, start_key, *count, fields.as_deref()).map(|(status, _)| status)
        }
        Operation::Delete { key } => db.delete(table, key),
        Operation::Unavailable(_) => Ok(Status::NotFound),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FieldMap, Properties};
    use crate::Error;

    struct Flaky {
        calls: u32,
    }

    impl Db for Flaky {
        fn init(&mut self, _properties: &Properties) -> Result<()> {
            Ok(())
        }

        fn cleanup(&mut self) -> Result<()> {
            Ok(())
        }

        fn read(
            &mut self,
            _table: &str,
            key: &str,
            _fields: Option<&[String]>,
        ) -> Result<(Status, FieldMap)> {
            self.calls += 1;
            match key {
                "panic" => panic!("read exploded"),
                "io" => Err(Error::Connection("reset by peer".into())),
                "bad" => Err(Error::Operation("garbled reply".into())),
                _ => Ok((Status::Ok, FieldMap::new())),
            }
        }

        fn insert(&mut self, _table: &str, _key: &str, _values: &FieldMap) -> Result<Status> {
            Ok(Status::Ok)
        }
    }

    fn read(key: &str) -> Operation {
        Operation::Read { key: key.into(), fields: None }
    }

    #[test]
    fn test_dispatch_routes_and_defaults() {
        let mut db = Flaky { calls: 0 };
        assert_eq!(dispatch(&mut db, "t", &read("k")).unwrap(), Status::Ok);
        assert_eq!(
            dispatch(&mut db, "t", &Operation::Delete { key: "k".into() }).unwrap(),
            Status::NotImplemented
        );
        assert_eq!(
            dispatch(&mut db, "t", &Operation::Unavailable(OperationKind::Read)).unwrap(),
            Status::NotFound
        );
        assert_eq!(db.calls, 1, "unavailable operations must not reach the backend");
    }

    #[test]
    fn test_dispatch_guarded_catches_panics() {
        let mut db = Flaky { calls: 0 };
        let failure = dispatch_guarded(&mut db, "t", &read("panic")).unwrap_err();
        assert!(failure.message.contains("read exploded"));
        assert!(!failure.connection_lost);

        // Backend still usable afterwards
        assert_eq!(dispatch_guarded(&mut db, "t", &read("k")).unwrap(), Status::Ok);
    }

    #[test]
    fn test_dispatch_guarded_classifies_errors() {
        let mut db = Flaky { calls: 0 };
        assert!(dispatch_guarded(&mut db, "t", &read("io")).unwrap_err().connection_lost);
        assert!(!dispatch_guarded(&mut db, "t", &read("bad")).unwrap_err().connection_lost);
    }

    #[test]
    fn test_failure_log_keeps_first() {
        let log = FailureLog::new();
        log.record(0, OperationKind::Read, "first");
        log.record(1, OperationKind::Update, "second");
        log.record(2, OperationKind::Update, "third");
        assert_eq!(log.first().as_deref(), Some("READ: first"));
        assert_eq!(log.suppressed(), 2);
    }
}
