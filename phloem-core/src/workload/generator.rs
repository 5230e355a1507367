//! Key index generation
//!
//! Generators produce record indices, not key strings; the workload turns an index
//! into a key name. Every generator is shared by reference between workers and
//! takes the caller's RNG, so seeding stays per worker while the keyspace stays
//! global.

use super::counter::InsertCounter;
use crate::{Error, Result};
use phloem_common::ZipfianGenerator;
use rand::rngs::SmallRng;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of record indices
pub trait KeyGenerator: Send + Sync {
    /// Draw the next index
    ///
    /// Only finite generators fail, with [`Error::Exhausted`].
    fn next_index(&self, rng: &mut SmallRng) -> Result<u64>;

    /// Size of the keyspace this generator draws from right now
    fn items(&self) -> u64;

    fn name(&self) -> &'static str;
}

fn check_items(items: u64, what: &str) -> Result<()> {
    if items == 0 {
        return Err(Error::Config(format!("{what} key generator needs at least one item")));
    }
    Ok(())
}

fn check_fraction(value: f64, what: &str) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::Config(format!("{what} must be in [0.0, 1.0], got {value}")));
    }
    Ok(())
}

/// Uniform over `[0, items)`
#[derive(Debug, Clone)]
pub struct UniformKeys {
    items: u64,
}

impl UniformKeys {
    pub fn new(items: u64) -> Result<Self> {
        check_items(items, "uniform")?;
        Ok(Self { items })
    }
}

impl KeyGenerator for UniformKeys {
    fn next_index(&self, rng: &mut SmallRng) -> Result<u64> {
        Ok(rng.random_range(0..self.items))
    }

    fn items(&self) -> u64 {
        self.items
    }

    fn name(&self) -> &'static str {
        "uniform"
    }
}

/// Zipfian over `[0, items)`; index 0 is the hottest
#[derive(Debug)]
pub struct ZipfianKeys {
    zipf: ZipfianGenerator,
}

impl ZipfianKeys {
    pub fn new(items: u64, theta: f64) -> Result<Self> {
        check_items(items, "zipfian")?;
        let zipf = ZipfianGenerator::new(items, theta).map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { zipf })
    }

    pub fn theta(&self) -> f64 {
        self.zipf.theta()
    }
}

impl KeyGenerator for ZipfianKeys {
    fn next_index(&self, rng: &mut SmallRng) -> Result<u64> {
        Ok(self.zipf.sample(rng))
    }

    fn items(&self) -> u64 {
        self.zipf.items()
    }

    fn name(&self) -> &'static str {
        "zipfian"
    }
}

/// Favors the most recently inserted records
///
/// Draws `last - 1 - zipf(last)` where `last` is the number of indices the shared
/// insertion counter has issued, so the newest record is the hottest and the
/// popularity window moves with every insert.
#[derive(Debug)]
pub struct LatestKeys {
    counter: Arc<InsertCounter>,
    zipf: ZipfianGenerator,
}

impl LatestKeys {
    pub fn new(counter: Arc<InsertCounter>, theta: f64) -> Result<Self> {
        let zipf = ZipfianGenerator::new(counter.issued().max(1), theta)
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { counter, zipf })
    }
}

impl KeyGenerator for LatestKeys {
    fn next_index(&self, rng: &mut SmallRng) -> Result<u64> {
        let last = self.counter.issued();
        if last == 0 {
            return Err(Error::Exhausted { items: 0 });
        }
        let offset = self.zipf.sample_with_count(rng, last);
        Ok(last - 1 - offset)
    }

    fn items(&self) -> u64 {
        self.counter.issued()
    }

    fn name(&self) -> &'static str {
        "latest"
    }
}

/// A hot subset of the keyspace receives a fixed share of requests
///
/// With probability `hot_op_fraction` the index is uniform over the hot range
/// `[0, max(1, items * hot_set_fraction))`; otherwise it is uniform over the whole
/// keyspace.
#[derive(Debug, Clone)]
pub struct HotspotKeys {
    items: u64,
    hot_items: u64,
    hot_op_fraction: f64,
}

impl HotspotKeys {
    pub fn new(items: u64, hot_set_fraction: f64, hot_op_fraction: f64) -> Result<Self> {
        check_items(items, "hotspot")?;
        check_fraction(hot_set_fraction, "hot_set_fraction")?;
        check_fraction(hot_op_fraction, "hot_op_fraction")?;
        let hot_items = ((items as f64 * hot_set_fraction) as u64).clamp(1, items);
        Ok(Self { items, hot_items, hot_op_fraction })
    }

    pub fn hot_items(&self) -> u64 {
        self.hot_items
    }
}

impl KeyGenerator for HotspotKeys {
    fn next_index(&self, rng: &mut SmallRng) -> Result<u64> {
        let hot = rng.random::<f64>() < self.hot_op_fraction;
        let upper = if hot { self.hot_items } else { self.items };
        Ok(rng.random_range(0..upper))
    }

    fn items(&self) -> u64 {
        self.items
    }

    fn name(&self) -> &'static str {
        "hotspot"
    }
}

/// `0, 1, ..., items - 1` once each across all callers
#[derive(Debug)]
pub struct SequentialKeys {
    items: u64,
    next: AtomicU64,
}

impl SequentialKeys {
    pub fn new(items: u64) -> Result<Self> {
        check_items(items, "sequential")?;
        Ok(Self { items, next: AtomicU64::new(0) })
    }
}

impl KeyGenerator for SequentialKeys {
    fn next_index(&self, _rng: &mut SmallRng) -> Result<u64> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        if index >= self.items {
            return Err(Error::Exhausted { items: self.items });
        }
        Ok(index)
    }

    fn items(&self) -> u64 {
        self.items
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn test_uniform_in_range() {
        let keys = UniformKeys::new(10).unwrap();
        let mut rng = rng();
        let mut seen = [false; 10];
        for _ in 0..10_000 {
            let index = keys.next_index(&mut rng).unwrap();
            assert!(index < 10);
            seen[index as usize] = true;
        }
        assert!(seen.iter().all(|s| *s), "every index should be drawn");
    }

    #[test]
    fn test_zero_items_rejected() {
        assert!(matches!(UniformKeys::new(0), Err(Error::Config(_))));
        assert!(matches!(ZipfianKeys::new(0, 0.99), Err(Error::Config(_))));
        assert!(matches!(HotspotKeys::new(0, 0.2, 0.8), Err(Error::Config(_))));
        assert!(matches!(SequentialKeys::new(0), Err(Error::Config(_))));
    }

    #[test]
    fn test_zipfian_theta_validated() {
        assert!(matches!(ZipfianKeys::new(100, 1.0), Err(Error::Config(_))));
        assert!(matches!(ZipfianKeys::new(100, -0.5), Err(Error::Config(_))));
    }

    #[test]
    fn test_zipfian_prefers_low_indices() {
        let keys = ZipfianKeys::new(1000, 0.99).unwrap();
        let mut rng = rng();
        let low = (0..10_000).filter(|_| keys.next_index(&mut rng).unwrap() < 10).count();
        assert!(low > 2_500, "only {low} of 10000 draws hit the 10 hottest keys");
    }

    #[test]
    fn test_latest_tracks_counter() {
        let counter = Arc::new(InsertCounter::new(100));
        let keys = LatestKeys::new(Arc::clone(&counter), 0.99).unwrap();
        let mut rng = rng();

        for _ in 0..1_000 {
            assert!(keys.next_index(&mut rng).unwrap() < 100);
        }

        for _ in 0..50 {
            counter.next_index();
        }
        let mut newest = 0;
        for _ in 0..10_000 {
            let index = keys.next_index(&mut rng).unwrap();
            assert!(index < 150);
            if index == 149 {
                newest += 1;
            }
        }
        assert!(newest > 1_000, "newest record drawn only {newest} times");
    }

    #[test]
    fn test_latest_empty_counter() {
        let keys = LatestKeys::new(Arc::new(InsertCounter::new(0)), 0.99).unwrap();
        assert!(matches!(keys.next_index(&mut rng()), Err(Error::Exhausted { .. })));
    }

    #[test]
    fn test_hotspot_share() {
        let keys = HotspotKeys::new(1000, 0.1, 0.9).unwrap();
        assert_eq!(keys.hot_items(), 100);
        let mut rng = rng();
        let hot = (0..100_000).filter(|_| keys.next_index(&mut rng).unwrap() < 100).count();
        // 0.9 directly plus 0.1 * 0.1 from cold draws landing in the hot range
        let share = hot as f64 / 100_000.0;
        assert!((share - 0.91).abs() < 0.01, "hot share {share}");
    }

    #[test]
    fn test_hotspot_tiny_hot_set() {
        let keys = HotspotKeys::new(10, 0.01, 1.0).unwrap();
        assert_eq!(keys.hot_items(), 1);
        let mut rng = rng();
        for _ in 0..100 {
            assert_eq!(keys.next_index(&mut rng).unwrap(), 0);
        }
    }

    #[test]
    fn test_hotspot_fractions_validated() {
        assert!(HotspotKeys::new(10, 1.5, 0.5).is_err());
        assert!(HotspotKeys::new(10, 0.5, -0.1).is_err());
    }

    #[test]
    fn test_sequential_exhausts() {
        let keys = SequentialKeys::new(3).unwrap();
        let mut rng = rng();
        let drawn: Vec<u64> = (0..3).map(|_| keys.next_index(&mut rng).unwrap()).collect();
        assert_eq!(drawn, vec![0, 1, 2]);
        assert!(matches!(keys.next_index(&mut rng), Err(Error::Exhausted { items: 3 })));
        assert!(keys.next_index(&mut rng).is_err());
    }
}
