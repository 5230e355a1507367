//! Periodic progress logging

use super::cancel::CancellationToken;
use crate::stats::Measurements;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::info;

/// Sleep granularity while waiting for the next report
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Background thread that logs completed operations and current throughput
pub struct StatusReporter {
    handle: JoinHandle<()>,
    stop: CancellationToken,
}

impl StatusReporter {
    /// Start reporting every `interval` until [`StatusReporter::stop`]
    pub fn spawn(interval: Duration, measurements: Arc<Measurements>) -> std::io::Result<Self> {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let handle = thread::Builder::new()
            .name("phloem-status".into())
            .spawn(move || report_loop(interval, &measurements, &token))?;
        Ok(Self { handle, stop })
    }

    pub fn stop(self) {
        self.stop.cancel();
        if self.handle.join().is_err() {
            tracing::warn!("Status reporter thread panicked");
        }
    }
}

fn report_loop(interval: Duration, measurements: &Measurements, stop: &CancellationToken) {
    let start = Instant::now();
    let mut last_report = start;
    let mut last_total = 0;

    while !stop.is_cancelled() {
        thread::sleep(POLL_INTERVAL.min(interval));
        let now = Instant::now();
        if now.duration_since(last_report) < interval {
            continue;
        }

        let total = measurements.total();
        let window = now.duration_since(last_report).as_secs_f64();
        let current = if window > 0.0 { (total - last_total) as f64 / window } else { 0.0 };
        info!(
            "{} sec: {} operations; {:.1} current ops/sec",
            start.elapsed().as_secs(),
            total,
            current
        );
        last_report = now;
        last_total = total;
    }
}
