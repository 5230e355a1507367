//! Per-worker rate policies
//!
//! A policy decides WHEN a worker may dispatch its next operation. Each worker owns
//! its own policy, so a target throughput is split evenly across workers and no
//! timing state is shared between threads.

use crate::config::RateModel;
use crate::seed::{components, derive_seed};
use crate::workload::distributions::ExponentialDistribution;
use crate::{Error, Result};

/// Traffic model for one worker
pub trait Policy: Send {
    /// Absolute time (nanoseconds, `timing::time_ns` clock) of the next dispatch
    ///
    /// - `Some(time_ns)`: dispatch at this time (may be in the past = now)
    /// - `None`: dispatch immediately (closed loop)
    fn next_send_time(&mut self, current_time_ns: u64) -> Option<u64>;

    /// Record that an operation was dispatched at `sent_time_ns`
    fn on_request_sent(&mut self, sent_time_ns: u64);

    fn name(&self) -> &'static str;
}

/// No throttling: the next operation starts as soon as the previous one returns
#[derive(Debug, Default)]
pub struct ClosedLoopPolicy;

impl ClosedLoopPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl Policy for ClosedLoopPolicy {
    fn next_send_time(&mut self, _current_time_ns: u64) -> Option<u64> {
        None
    }

    fn on_request_sent(&mut self, _sent_time_ns: u64) {}

    fn name(&self) -> &'static str {
        "ClosedLoop"
    }
}

/// Evenly spaced dispatches, `1 / rate` seconds after the previous one
#[derive(Debug)]
pub struct FixedRatePolicy {
    rate: f64,
    inter_arrival_ns: u64,
    last_send_time_ns: Option<u64>,
}

impl FixedRatePolicy {
    /// `rate` in operations per second
    pub fn new(rate: f64) -> Self {
        Self { rate, inter_arrival_ns: (1_000_000_000.0 / rate) as u64, last_send_time_ns: None }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl Policy for FixedRatePolicy {
    fn next_send_time(&mut self, _current_time_ns: u64) -> Option<u64> {
        match self.last_send_time_ns {
            Some(last_time) => Some(last_time + self.inter_arrival_ns),
            None => Some(0),
        }
    }

    fn on_request_sent(&mut self, sent_time_ns: u64) {
        self.last_send_time_ns = Some(sent_time_ns);
    }

    fn name(&self) -> &'static str {
        "FixedRate"
    }
}

/// Exponentially distributed inter-arrival times (Poisson process)
pub struct PoissonPolicy {
    dist: ExponentialDistribution,
    last_send_time_ns: Option<u64>,
}

impl PoissonPolicy {
    /// `lambda` is the mean rate in operations per second
    pub fn new(lambda: f64) -> anyhow::Result<Self> {
        Self::with_seed(lambda, None)
    }

    pub fn with_seed(lambda: f64, seed: Option<u64>) -> anyhow::Result<Self> {
        let dist = ExponentialDistribution::with_seed(lambda, seed)?;
        Ok(Self { dist, last_send_time_ns: None })
    }

    pub fn lambda(&self) -> f64 {
        self.dist.lambda()
    }
}

impl Policy for PoissonPolicy {
    fn next_send_time(&mut self, _current_time_ns: u64) -> Option<u64> {
        match self.last_send_time_ns {
            Some(last_time) => {
                let inter_arrival_ns = (self.dist.sample_inter_arrival() * 1_000_000_000.0) as u64;
                Some(last_time + inter_arrival_ns)
            }
            None => Some(0),
        }
    }

    fn on_request_sent(&mut self, sent_time_ns: u64) {
        self.last_send_time_ns = Some(sent_time_ns);
    }

    fn name(&self) -> &'static str {
        "Poisson"
    }
}

/// Build the policy for one worker
///
/// A target throughput is divided evenly between `threads` workers; without one
/// every worker runs closed loop.
pub fn worker_policy(
    target_throughput: Option<f64>,
    rate_model: RateModel,
    threads: usize,
    worker_id: usize,
    seed: Option<u64>,
) -> Result<Box<dyn Policy>> {
    let Some(target) = target_throughput else {
        return Ok(Box::new(ClosedLoopPolicy::new()));
    };
    if !target.is_finite() || target <= 0.0 {
        return Err(Error::Config(format!("target throughput must be > 0, got {target}")));
    }

    let per_worker = target / threads.max(1) as f64;
    match rate_model {
        RateModel::Fixed => Ok(Box::new(FixedRatePolicy::new(per_worker))),
        RateModel::Poisson => {
            let seed = seed.map(|master| {
                derive_seed(master, &components::per_worker(components::POISSON_POLICY, worker_id))
            });
            let policy = PoissonPolicy::with_seed(per_worker, seed)
                .map_err(|e| Error::Config(e.to_string()))?;
            Ok(Box::new(policy))
        }
    }
}
