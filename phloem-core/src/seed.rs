//! Reproducible seed derivation
//!
//! One master seed from the profile fans out into an independent stream per
//! component and per worker. Each derived seed is the first 8 bytes of
//! `SHA-256(master || component)`, so the same master and component name always
//! give the same stream, and two names never share one in practice.
//!
//! ```
//! use phloem_core::seed::{components, derive_seed};
//!
//! let rng_seed = derive_seed(42, &components::per_worker(components::WORKER_RNG, 0));
//! assert_eq!(rng_seed, derive_seed(42, "worker_rng/0"));
//! assert_ne!(rng_seed, derive_seed(42, "worker_rng/1"));
//! ```

use sha2::{Digest, Sha256};

/// Derive the seed of `component` from `master_seed`
pub fn derive_seed(master_seed: u64, component: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(master_seed.to_be_bytes());
    hasher.update(component.as_bytes());
    let digest = hasher.finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Component names used for seed derivation
pub mod components {
    /// Key choice and operation choice of a worker
    pub const WORKER_RNG: &str = "worker_rng";
    /// Field values and lengths of a worker
    pub const FIELD_GENERATOR: &str = "field_generator";
    /// Inter-arrival sampling of a worker's poisson policy
    pub const POISSON_POLICY: &str = "poisson_policy";

    /// Component name for a per-worker stream, e.g. `worker_rng/3`
    pub fn per_worker(component: &str, worker_id: usize) -> String {
        format!("{component}/{worker_id}")
    }
}
