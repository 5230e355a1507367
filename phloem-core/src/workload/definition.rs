//! Workload definition: turns configuration into a stream of operations

use super::counter::InsertCounter;
use super::fields::{FieldGenerator, FieldLengthSpec};
use super::generator::{
    HotspotKeys, KeyGenerator, LatestKeys, SequentialKeys, UniformKeys, ZipfianKeys,
};
use super::operation::{Operation, OperationKind};
use crate::config::{
    FieldLengthConfig, InsertOrder, RequestDistributionConfig, ScanLengthDistribution,
    WorkloadConfig,
};
use crate::seed::{components, derive_seed};
use crate::{Error, Result};
use phloem_common::{ZipfianGenerator, DEFAULT_ZIPFIAN_THETA};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, warn};

/// Draws outside the inserted range are redrawn this many times before folding
const MAX_KEY_RETRIES: usize = 16;

/// Benchmark phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Populate the keyspace: inserts only, bounded by the insert count
    Load,
    /// Execute the configured operation mix
    Run,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Load => "load",
            Phase::Run => "run",
        }
    }
}

/// Weighted choice of operation kind
#[derive(Debug, Clone)]
pub struct OperationChooser {
    // (kind, cumulative probability), zero weights omitted
    thresholds: Vec<(OperationKind, f64)>,
}

impl OperationChooser {
    /// Build from raw weights, normalizing if they do not sum to 1.0
    pub fn new(weights: &[(OperationKind, f64)]) -> Result<Self> {
        let mut total = 0.0;
        for (kind, weight) in weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(Error::Config(format!(
                    "weight for {kind} must be a non-negative number, got {weight}"
                )));
            }
            total += weight;
        }
        if total <= 0.0 {
            return Err(Error::config("operation proportions are all zero"));
        }
        if (total - 1.0).abs() > 1e-9 {
            warn!("Operation proportions sum to {total}, normalizing");
        }

        let mut cumulative = 0.0;
        let mut thresholds = Vec::with_capacity(weights.len());
        for (kind, weight) in weights {
            if *weight > 0.0 {
                cumulative += weight / total;
                thresholds.push((*kind, cumulative));
            }
        }
        Ok(Self { thresholds })
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> OperationKind {
        let u: f64 = rng.random();
        for (kind, threshold) in &self.thresholds {
            if u < *threshold {
                return *kind;
            }
        }
        // Rounding can leave the last cumulative value a hair below 1.0
        self.thresholds[self.thresholds.len() - 1].0
    }

    /// Normalized probability of `kind`
    pub fn probability(&self, kind: OperationKind) -> f64 {
        let mut previous = 0.0;
        for (k, threshold) in &self.thresholds {
            if *k == kind {
                return threshold - previous;
            }
            previous = *threshold;
        }
        0.0
    }
}

/// Index to key name mapping
#[derive(Debug, Clone)]
pub struct KeyNaming {
    prefix: String,
    order: InsertOrder,
    zero_padding: usize,
}

impl KeyNaming {
    pub fn new(prefix: impl Into<String>, order: InsertOrder, zero_padding: usize) -> Self {
        Self { prefix: prefix.into(), order, zero_padding }
    }

    pub fn key_name(&self, index: u64) -> String {
        let number = match self.order {
            InsertOrder::Hashed => fnv_hash64(index),
            InsertOrder::Ordered => index,
        };
        format!("{}{:0width$}", self.prefix, number, width = self.zero_padding)
    }
}

/// FNV-1a over the little-endian bytes of `value`
pub fn fnv_hash64(value: u64) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for byte in value.to_le_bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[derive(Debug)]
enum ScanLengths {
    Uniform { max: usize },
    Zipfian(ZipfianGenerator),
}

impl ScanLengths {
    fn sample(&self, rng: &mut SmallRng) -> usize {
        match self {
            ScanLengths::Uniform { max } => rng.random_range(1..=*max),
            ScanLengths::Zipfian(zipf) => zipf.sample(rng) as usize,
        }
    }
}

/// Per-worker generation state
///
/// Owned by exactly one worker thread; holds the random streams so the shared
/// [`Workload`] stays immutable apart from its atomic counters.
#[derive(Debug)]
pub struct WorkerContext {
    worker_id: usize,
    rng: SmallRng,
    fields: FieldGenerator,
}

impl WorkerContext {
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }
}

/// A configured workload shared by every worker
///
/// `next_operation` is safe to call concurrently: key generators take the
/// caller's RNG and the insertion counter is atomic, so no two inserts ever get
/// the same index.
pub struct Workload {
    phase: Phase,
    chooser: OperationChooser,
    keys: Box<dyn KeyGenerator>,
    counter: Arc<InsertCounter>,
    naming: KeyNaming,
    field_count: usize,
    field_prefix: String,
    field_lengths: FieldLengthSpec,
    read_all_fields: bool,
    write_all_fields: bool,
    scan_lengths: ScanLengths,
    seed: Option<u64>,
}

impl Workload {
    /// Build a workload for `phase`
    ///
    /// `expected_operations` sizes the Zipfian keyspace to cover the records the
    /// run phase is expected to insert.
    pub fn from_config(
        config: &WorkloadConfig,
        phase: Phase,
        seed: Option<u64>,
        expected_operations: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;

        let counter = Arc::new(match phase {
            Phase::Load => InsertCounter::with_limit(config.insert_start, config.load_count()),
            Phase::Run => InsertCounter::new(config.record_count),
        });

        let chooser = match phase {
            Phase::Load => OperationChooser::new(&[(OperationKind::Insert, 1.0)])?,
            Phase::Run => OperationChooser::new(&config.proportions.weights())?,
        };

        let keyspace = config.record_count.max(1);
        let keys: Box<dyn KeyGenerator> = match &config.request_distribution {
            RequestDistributionConfig::Uniform => Box::new(UniformKeys::new(keyspace)?),
            RequestDistributionConfig::Zipfian { theta } => {
                let insert_share = chooser.probability(OperationKind::Insert);
                let expected_inserts = match (phase, expected_operations) {
                    (Phase::Run, Some(ops)) => (ops as f64 * insert_share * 2.0) as u64,
                    _ => 0,
                };
                Box::new(ZipfianKeys::new(keyspace + expected_inserts, *theta)?)
            }
            RequestDistributionConfig::Latest { theta } => {
                Box::new(LatestKeys::new(Arc::clone(&counter), *theta)?)
            }
            RequestDistributionConfig::Hotspot { hot_set_fraction, hot_op_fraction } => {
                Box::new(HotspotKeys::new(keyspace, *hot_set_fraction, *hot_op_fraction)?)
            }
            RequestDistributionConfig::Sequential => Box::new(SequentialKeys::new(keyspace)?),
        };

        let mut field_lengths = match config.field_length {
            FieldLengthConfig::Constant { length } => FieldLengthSpec::constant(length),
            FieldLengthConfig::Uniform { min, max } => FieldLengthSpec::uniform(min, max)?,
            FieldLengthConfig::Zipfian { max } => FieldLengthSpec::zipfian(max)?,
        };
        if let Some(cap) = config.max_field_length {
            field_lengths = field_lengths.with_max(cap);
        }

        let max_scan = config.scan.max_length;
        let scan_lengths = match config.scan.length_distribution {
            ScanLengthDistribution::Uniform => ScanLengths::Uniform { max: max_scan },
            ScanLengthDistribution::Zipfian => ScanLengths::Zipfian(
                ZipfianGenerator::with_range(1, max_scan as u64, DEFAULT_ZIPFIAN_THETA)
                    .map_err(|e| Error::Config(e.to_string()))?,
            ),
        };

        debug!(
            "Workload for {} phase: {} keys, distribution {}, {} fields",
            phase.as_str(),
            keyspace,
            keys.name(),
            config.field_count
        );

        Ok(Self {
            phase,
            chooser,
            keys,
            counter,
            naming: KeyNaming::new(&config.key_prefix, config.insert_order, config.zero_padding),
            field_count: config.field_count,
            field_prefix: config.field_prefix.clone(),
            field_lengths,
            read_all_fields: config.read_all_fields,
            write_all_fields: config.write_all_fields,
            scan_lengths,
            seed,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The shared insertion counter
    pub fn counter(&self) -> &Arc<InsertCounter> {
        &self.counter
    }

    pub fn key_name(&self, index: u64) -> String {
        self.naming.key_name(index)
    }

    /// Random streams for worker `worker_id`, derived from the master seed
    pub fn worker_context(&self, worker_id: usize) -> WorkerContext {
        let (rng, fields) = match self.seed {
            Some(master) => {
                let rng_seed =
                    derive_seed(master, &components::per_worker(components::WORKER_RNG, worker_id));
                let field_seed = derive_seed(
                    master,
                    &components::per_worker(components::FIELD_GENERATOR, worker_id),
                );
                (SmallRng::seed_from_u64(rng_seed), Some(field_seed))
            }
            None => (SmallRng::from_os_rng(), None),
        };
        WorkerContext {
            worker_id,
            rng,
            fields: FieldGenerator::with_prefix(fields, self.field_prefix.clone()),
        }
    }

    /// Produce the next operation, or `None` when the sequence has ended
    ///
    /// The sequence ends when a bounded insert range is used up (load phase) or a
    /// sequential request distribution has visited every key.
    pub fn next_operation(&self, ctx: &mut WorkerContext) -> Result<Option<Operation>> {
        let kind = self.chooser.choose(&mut ctx.rng);

        let index = if kind == OperationKind::Insert {
            match self.counter.next_index() {
                Some(index) => index,
                None => return Ok(None),
            }
        } else {
            match self.existing_index(&mut ctx.rng) {
                Ok(Some(index)) => index,
                Ok(None) => return Ok(Some(Operation::Unavailable(kind))),
                Err(Error::Exhausted { .. }) => return Ok(None),
                Err(e) => return Err(e),
            }
        };

        Ok(Some(self.build_operation(kind, self.naming.key_name(index), ctx)))
    }

    fn build_operation(
        &self,
        kind: OperationKind,
        key: String,
        ctx: &mut WorkerContext,
    ) -> Operation {
        match kind {
            OperationKind::Read => Operation::Read { key, fields: self.read_fields(ctx) },
            OperationKind::Insert => Operation::Insert {
                key,
                values: ctx.fields.generate(self.field_count, &self.field_lengths),
            },
            OperationKind::Update => {
                let values = if self.write_all_fields {
                    ctx.fields.generate(self.field_count, &self.field_lengths)
                } else {
                    ctx.fields.generate_one(self.field_count, &self.field_lengths)
                };
                Operation::Update { key, values }
            }
            OperationKind::Scan => Operation::Scan {
                start_key: key,
                count: self.scan_lengths.sample(&mut ctx.rng),
                fields: self.read_fields(ctx),
            },
            OperationKind::Delete => Operation::Delete { key },
        }
    }

    /// Draw an index below the insertion high-water mark
    ///
    /// `Ok(None)` when nothing has been inserted yet.
    fn existing_index(&self, rng: &mut SmallRng) -> Result<Option<u64>> {
        let bound = self.counter.issued();
        if bound == 0 {
            return Ok(None);
        }
        let mut index = self.keys.next_index(rng)?;
        for _ in 0..MAX_KEY_RETRIES {
            if index < bound {
                return Ok(Some(index));
            }
            index = self.keys.next_index(rng)?;
        }
        Ok(Some(index % bound))
    }

    fn read_fields(&self, ctx: &mut WorkerContext) -> Option<Vec<String>> {
        if self.read_all_fields {
            None
        } else {
            Some(vec![ctx.fields.random_field_name(self.field_count)])
        }
    }
}

impl std::fmt::Debug for Workload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workload")
            .field("phase", &self.phase)
            .field("chooser", &self.chooser)
            .field("keys", &self.keys.name())
            .field("counter", &self.counter)
            .field("field_count", &self.field_count)
            .finish_non_exhaustive()
    }
}
