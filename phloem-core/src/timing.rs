//! Monotonic nanosecond clock and waiting helpers
//!
//! Every timestamp is nanoseconds since the first call to [`time_ns`] in the
//! process, so rate policies and workers on different threads share one clock.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Nanoseconds since the process-wide clock origin
///
/// ```
/// use phloem_core::timing::time_ns;
///
/// let before = time_ns();
/// assert!(time_ns() >= before);
/// ```
#[inline]
pub fn time_ns() -> u64 {
    ORIGIN.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// Spin until the clock reaches `target_ns`
#[inline]
pub fn busy_wait_until(target_ns: u64) {
    while time_ns() < target_ns {
        std::hint::spin_loop();
    }
}

/// Spin for `duration_ns` nanoseconds
///
/// Used for simulated service times, where sleeping would be far too coarse.
#[inline]
pub fn busy_wait_ns(duration_ns: u64) {
    busy_wait_until(time_ns().saturating_add(duration_ns));
}

/// Waits longer than this are slept through; shorter ones are spun
const SPIN_THRESHOLD_NS: u64 = 200_000;

/// Longest single sleep, bounding how late a stop request is noticed
const MAX_SLEEP_SLICE_NS: u64 = 10_000_000;

/// Wait until `target_ns`, returning early if `should_stop` reports true
///
/// Sleeps in slices of at most 10ms while far from the target and busy-waits the
/// final stretch, so rate-limited workers keep their schedule without burning a
/// core on long gaps. Returns `false` if the wait was cut short.
pub fn sleep_until(target_ns: u64, should_stop: impl Fn() -> bool) -> bool {
    loop {
        if should_stop() {
            return false;
        }
        let now = time_ns();
        if now >= target_ns {
            return true;
        }
        let remaining = target_ns - now;
        if remaining <= SPIN_THRESHOLD_NS {
            busy_wait_until(target_ns);
            return true;
        }
        let slice = (remaining - SPIN_THRESHOLD_NS).min(MAX_SLEEP_SLICE_NS);
        std::thread::sleep(Duration::from_nanos(slice));
    }
}
