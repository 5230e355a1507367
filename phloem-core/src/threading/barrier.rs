//! Start barrier for worker threads

use std::sync::{Arc, Barrier as StdBarrier};

/// Releases every participant at once
///
/// Thin cloneable wrapper around `std::sync::Barrier`; the executor uses it so
/// no worker starts dispatching before all backends are connected and every
/// thread is running.
#[derive(Clone)]
pub struct Barrier {
    inner: Arc<StdBarrier>,
    parties: usize,
}

impl Barrier {
    /// Barrier for `parties` participants (at least one)
    pub fn new(parties: usize) -> Self {
        let parties = parties.max(1);
        Self { inner: Arc::new(StdBarrier::new(parties)), parties }
    }

    /// Block until every participant arrives; `true` for exactly one of them
    pub fn wait(&self) -> bool {
        self.inner.wait().is_leader()
    }

    pub fn parties(&self) -> usize {
        self.parties
    }
}
