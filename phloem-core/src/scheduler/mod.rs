//! Dispatch pacing
//!
//! Every worker paces itself with its own [`Policy`]. There is no shared
//! scheduler: a worker asks its policy for the next dispatch time, waits, and
//! reports the dispatch back.
//!
//! ```text
//! Policy
//! ├── ClosedLoopPolicy   (no throttle)
//! ├── FixedRatePolicy    (target / threads ops/s, evenly spaced)
//! └── PoissonPolicy      (exponential inter-arrivals)
//! ```

pub mod policy;

pub use policy::{worker_policy, ClosedLoopPolicy, FixedRatePolicy, PoissonPolicy, Policy};
