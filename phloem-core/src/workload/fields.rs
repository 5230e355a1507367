//! Record content generation

use crate::db::FieldMap;
use crate::{Error, Result};
use phloem_common::{ZipfianGenerator, DEFAULT_ZIPFIAN_THETA};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Default field name prefix
pub const DEFAULT_FIELD_PREFIX: &str = "field";

/// Distribution of generated value lengths, capped at a hard maximum
#[derive(Debug, Clone)]
pub struct FieldLengthSpec {
    kind: LengthKind,
    max: usize,
}

#[derive(Debug, Clone)]
enum LengthKind {
    Constant(usize),
    Uniform { min: usize, max: usize },
    Zipfian(Arc<ZipfianGenerator>),
}

impl FieldLengthSpec {
    /// Every value is exactly `len` bytes
    pub fn constant(len: usize) -> Self {
        Self { kind: LengthKind::Constant(len), max: len }
    }

    /// Lengths uniform over `[min, max]`
    pub fn uniform(min: usize, max: usize) -> Result<Self> {
        if min > max {
            return Err(Error::Config(format!(
                "field length min ({min}) must be <= max ({max})"
            )));
        }
        Ok(Self { kind: LengthKind::Uniform { min, max }, max })
    }

    /// Lengths Zipfian over `[1, max]`, short values most common
    pub fn zipfian(max: usize) -> Result<Self> {
        if max == 0 {
            return Err(Error::Config("zipfian field length max must be > 0".into()));
        }
        let zipf = ZipfianGenerator::with_range(1, max as u64, DEFAULT_ZIPFIAN_THETA)
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self { kind: LengthKind::Zipfian(Arc::new(zipf)), max })
    }

    /// Lower the hard maximum; lengths above it are clamped
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = self.max.min(max);
        self
    }

    pub fn max_length(&self) -> usize {
        self.max
    }

    pub fn sample(&self, rng: &mut SmallRng) -> usize {
        let len = match &self.kind {
            LengthKind::Constant(len) => *len,
            LengthKind::Uniform { min, max } => rng.random_range(*min..=*max),
            LengthKind::Zipfian(zipf) => zipf.sample(rng) as usize,
        };
        len.min(self.max)
    }
}

/// Produces record contents from its own random stream
///
/// One generator per worker. Built with a seed, the sequence of generated maps is
/// identical on every run.
#[derive(Debug)]
pub struct FieldGenerator {
    rng: SmallRng,
    prefix: String,
}

impl FieldGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        Self::with_prefix(seed, DEFAULT_FIELD_PREFIX)
    }

    pub fn with_prefix(seed: Option<u64>, prefix: impl Into<String>) -> Self {
        let rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_os_rng(),
        };
        Self { rng, prefix: prefix.into() }
    }

    pub fn field_name(&self, index: usize) -> String {
        format!("{}{}", self.prefix, index)
    }

    /// Names of every field in a record of `field_count` fields
    pub fn field_names(&self, field_count: usize) -> Vec<String> {
        (0..field_count).map(|i| self.field_name(i)).collect()
    }

    /// Pick one field name uniformly
    pub fn random_field_name(&mut self, field_count: usize) -> String {
        let index = self.rng.random_range(0..field_count.max(1));
        self.field_name(index)
    }

    /// A complete record of `field_count` fields
    pub fn generate(&mut self, field_count: usize, lengths: &FieldLengthSpec) -> FieldMap {
        let mut fields = FieldMap::new();
        for i in 0..field_count {
            let value = self.value(lengths);
            fields.insert(self.field_name(i), value);
        }
        fields
    }

    /// A single randomly chosen field, for partial updates
    pub fn generate_one(&mut self, field_count: usize, lengths: &FieldLengthSpec) -> FieldMap {
        let name = self.random_field_name(field_count);
        let mut fields = FieldMap::new();
        fields.insert(name, self.value(lengths));
        fields
    }

    fn value(&mut self, lengths: &FieldLengthSpec) -> Vec<u8> {
        let len = lengths.sample(&mut self.rng);
        // Printable ASCII, space through tilde
        (0..len).map(|_| self.rng.random_range(b' '..=b'~')).collect()
    }
}
