//! Statistical distributions for workload generation
//!
//! Provides the distributions used by:
//! - Key selection (Zipfian for skewed popularity, also the basis of "latest")
//! - Field and scan length selection (Zipfian)
//! - Inter-arrival timing (Exponential for Poisson rate control)

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use std::sync::{PoisonError, RwLock};

/// YCSB's default Zipfian skew
pub const DEFAULT_ZIPFIAN_THETA: f64 = 0.99;

/// Zipfian generator over `[base, base + items)` using closed-form CDF inversion
///
/// Implements the algorithm from Gray et al., "Quickly Generating Billion-Record
/// Synthetic Databases" (SIGMOD '94), the same construction YCSB uses. Only the
/// normalisation constant zeta(n, theta) is precomputed, in O(n) time and O(1)
/// space, so very large keyspaces never materialise a probability table.
///
/// Unlike the other distributions here the generator does not own an RNG: it is
/// shared between worker threads and each caller supplies its own random source.
/// The zeta cache is the only mutable state. When a caller samples with a
/// larger item count than the cache was built for (the "latest" distribution
/// grows with every insert), zeta is extended incrementally under a write lock.
///
/// Item `base` is the most popular; theta controls skew:
/// - theta = 0.0: Uniform
/// - theta = 0.99: Typical database workload (YCSB default)
/// - theta must stay below 1.0 (alpha = 1 / (1 - theta))
#[derive(Debug)]
pub struct ZipfianGenerator {
    base: u64,
    items: u64,
    theta: f64,
    alpha: f64,
    zeta2theta: f64,
    cache: RwLock<ZetaCache>,
}

#[derive(Debug, Clone, Copy)]
struct ZetaCache {
    count: u64,
    zetan: f64,
    eta: f64,
}

impl ZipfianGenerator {
    /// Create a generator over `[0, items)`
    pub fn new(items: u64, theta: f64) -> anyhow::Result<Self> {
        Self::with_range(0, items, theta)
    }

    /// Create a generator over `[base, base + items)`
    pub fn with_range(base: u64, items: u64, theta: f64) -> anyhow::Result<Self> {
        if items == 0 {
            anyhow::bail!("Zipfian item count must be > 0");
        }
        if !(0.0..1.0).contains(&theta) {
            anyhow::bail!("Zipfian theta must be in range [0.0, 1.0), got {}", theta);
        }

        let zeta2theta = zeta(0, 2, theta, 0.0);
        let zetan = zeta(0, items, theta, 0.0);
        let eta = eta(items, theta, zeta2theta, zetan);

        Ok(Self {
            base,
            items,
            theta,
            alpha: 1.0 / (1.0 - theta),
            zeta2theta,
            cache: RwLock::new(ZetaCache { count: items, zetan, eta }),
        })
    }

    /// Sample from the configured range
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        self.sample_with_count(rng, self.items)
    }

    /// Sample from `[base, base + count)`
    ///
    /// `count` may differ from the construction-time item count; the zeta cache is
    /// updated to match. Growing counts are cheap (only the new terms are summed),
    /// shrinking counts force a full recomputation.
    pub fn sample_with_count<R: Rng + ?Sized>(&self, rng: &mut R, count: u64) -> u64 {
        let count = count.max(1);
        let (zetan, eta) = self.params_for(count);

        let u: f64 = rng.random();
        let uz = u * zetan;

        if uz < 1.0 {
            return self.base;
        }
        if uz < 1.0 + 0.5f64.powf(self.theta) {
            return self.base + 1.min(count - 1);
        }

        let offset = (count as f64 * (eta * u - eta + 1.0).powf(self.alpha)) as u64;
        self.base + offset.min(count - 1)
    }

    fn params_for(&self, count: u64) -> (f64, f64) {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if cache.count == count {
                return (cache.zetan, cache.eta);
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have updated the cache while we waited for the lock
        if cache.count != count {
            let zetan = if count > cache.count {
                zeta(cache.count, count, self.theta, cache.zetan)
            } else {
                zeta(0, count, self.theta, 0.0)
            };
            *cache = ZetaCache {
                count,
                zetan,
                eta: eta(count, self.theta, self.zeta2theta, zetan),
            };
        }
        (cache.zetan, cache.eta)
    }

    /// Number of items in the construction-time range
    pub fn items(&self) -> u64 {
        self.items
    }

    /// Lowest (most popular) value
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Get the exponent (theta)
    pub fn theta(&self) -> f64 {
        self.theta
    }
}

/// Partial zeta sum: `initial + sum_{i = from + 1}^{to} 1 / i^theta`
fn zeta(from: u64, to: u64, theta: f64, initial: f64) -> f64 {
    let mut sum = initial;
    for i in from..to {
        sum += 1.0 / ((i + 1) as f64).powf(theta);
    }
    sum
}

fn eta(count: u64, theta: f64, zeta2theta: f64, zetan: f64) -> f64 {
    (1.0 - (2.0 / count as f64).powf(1.0 - theta)) / (1.0 - zeta2theta / zetan)
}

/// Exponential distribution (Poisson inter-arrival times)
pub struct ExponentialDistribution {
    lambda: f64,
    rng: SmallRng,
    dist: Exp<f64>,
}

impl ExponentialDistribution {
    pub fn new(lambda: f64) -> anyhow::Result<Self> {
        Self::with_seed(lambda, None)
    }

    pub fn with_seed(lambda: f64, seed: Option<u64>) -> anyhow::Result<Self> {
        if lambda <= 0.0 {
            anyhow::bail!("Exponential lambda must be > 0");
        }

        let rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_os_rng(),
        };
        let dist = Exp::new(lambda)?;

        Ok(Self { lambda, rng, dist })
    }

    /// Sample an inter-arrival time in seconds
    pub fn sample_inter_arrival(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    #[test]
    fn test_zipfian_basic() {
        let zipf = ZipfianGenerator::new(100, 0.99).expect("Failed to create Zipfian");
        let mut rng = rng();
        for _ in 0..10_000 {
            let key = zipf.sample(&mut rng);
            assert!(key < 100, "Key {} out of range [0, 100)", key);
        }
    }

    #[test]
    fn test_zipfian_parameter_validation() {
        assert!(ZipfianGenerator::new(0, 0.99).is_err());
        assert!(ZipfianGenerator::new(100, -0.1).is_err());
        assert!(ZipfianGenerator::new(100, 1.0).is_err());
        assert!(ZipfianGenerator::new(100, 0.0).is_ok());
    }

    #[test]
    fn test_zipfian_with_range_offsets_samples() {
        let zipf = ZipfianGenerator::with_range(1, 10, 0.99).unwrap();
        let mut rng = rng();
        for _ in 0..10_000 {
            let v = zipf.sample(&mut rng);
            assert!((1..=10).contains(&v), "Value {} out of range [1, 10]", v);
        }
    }

    #[test]
    fn test_zipfian_skew() {
        let zipf = ZipfianGenerator::new(1000, 0.99).unwrap();
        let mut rng = rng();
        let mut counts = vec![0u32; 1000];
        for _ in 0..100_000 {
            counts[zipf.sample(&mut rng) as usize] += 1;
        }

        let max_count = *counts.iter().max().unwrap();
        assert_eq!(counts[0], max_count, "Item 0 should be the most popular");

        let top_10_percent: u32 = counts[..100].iter().sum();
        let bottom_10_percent: u32 = counts[900..].iter().sum();
        assert!(
            top_10_percent > bottom_10_percent * 5,
            "Top 10%: {}, bottom 10%: {}",
            top_10_percent,
            bottom_10_percent
        );
    }

    #[test]
    fn test_zipfian_theta_zero_is_roughly_uniform() {
        let zipf = ZipfianGenerator::new(10, 0.0).unwrap();
        let mut rng = rng();
        let mut counts = [0u32; 10];
        for _ in 0..100_000 {
            counts[zipf.sample(&mut rng) as usize] += 1;
        }
        for (item, count) in counts.iter().enumerate() {
            assert!(
                (8_000..12_000).contains(count),
                "Item {} drawn {} times, expected ~10000",
                item,
                count
            );
        }
    }

    #[test]
    fn test_zipfian_sample_with_growing_count() {
        let zipf = ZipfianGenerator::new(10, 0.99).unwrap();
        let mut rng = rng();
        for count in [10u64, 50, 500, 20, 1] {
            for _ in 0..1_000 {
                let v = zipf.sample_with_count(&mut rng, count);
                assert!(v < count, "Value {} out of range [0, {})", v, count);
            }
        }
    }

    #[test]
    fn test_zipfian_incremental_zeta_matches_full() {
        let grown = ZipfianGenerator::new(10, 0.9).unwrap();
        let mut rng = rng();
        grown.sample_with_count(&mut rng, 1000);
        let fresh = ZipfianGenerator::new(1000, 0.9).unwrap();

        let (grown_zeta, grown_eta) = grown.params_for(1000);
        let (fresh_zeta, fresh_eta) = fresh.params_for(1000);
        assert!((grown_zeta - fresh_zeta).abs() < 1e-9);
        assert!((grown_eta - fresh_eta).abs() < 1e-9);
    }

    #[test]
    fn test_zipfian_single_item() {
        let zipf = ZipfianGenerator::new(1, 0.99).unwrap();
        let mut rng = rng();
        for _ in 0..100 {
            assert_eq!(zipf.sample(&mut rng), 0);
        }
    }

    #[test]
    fn test_exponential_basic() {
        let mut dist = ExponentialDistribution::new(1000.0).expect("Failed to create Exponential");
        for _ in 0..100 {
            let sample = dist.sample_inter_arrival();
            assert!(sample >= 0.0, "Sample should be non-negative");
        }
    }

    #[test]
    fn test_exponential_validation() {
        assert!(ExponentialDistribution::new(0.0).is_err());
        assert!(ExponentialDistribution::new(-5.0).is_err());
    }

    #[test]
    fn test_exponential_seeded_reproducible() {
        let mut a = ExponentialDistribution::with_seed(100.0, Some(3)).unwrap();
        let mut b = ExponentialDistribution::with_seed(100.0, Some(3)).unwrap();
        for _ in 0..10 {
            assert_eq!(a.sample_inter_arrival(), b.sample_inter_arrival());
        }
    }
}
