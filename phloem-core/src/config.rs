//! Configuration types for phloem core
//!
//! These are the serde-facing shapes of the `[workload]` profile section and the
//! rate model. They are validated here and turned into runtime objects by
//! [`crate::workload::Workload::from_config`] and [`crate::threading::Executor`].

use crate::workload::OperationKind;
use crate::{Error, Result};
use phloem_common::DEFAULT_ZIPFIAN_THETA;
use serde::{Deserialize, Serialize};

/// Workload definition: keyspace, record shape, operation mix and distributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct WorkloadConfig {
    /// Records present before the run phase starts
    #[serde(default = "default_record_count")]
    pub record_count: u64,
    /// First index inserted by the load phase
    #[serde(default)]
    pub insert_start: u64,
    /// Records inserted by the load phase (default: record_count - insert_start)
    #[serde(default)]
    pub insert_count: Option<u64>,
    /// Prefix of every key name
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// How an index becomes a key name
    #[serde(default)]
    pub insert_order: InsertOrder,
    /// Minimum digits of the numeric key suffix
    #[serde(default = "default_zero_padding")]
    pub zero_padding: usize,
    /// Fields per record
    #[serde(default = "default_field_count")]
    pub field_count: usize,
    /// Prefix of every field name
    #[serde(default = "default_field_prefix")]
    pub field_prefix: String,
    /// Value length distribution
    #[serde(default)]
    pub field_length: FieldLengthConfig,
    /// Hard cap on any generated value length, below the distribution's own maximum
    #[serde(default)]
    pub max_field_length: Option<usize>,
    /// Reads request every field (otherwise one random field)
    #[serde(default = "default_true")]
    pub read_all_fields: bool,
    /// Updates write every field (otherwise one random field)
    #[serde(default)]
    pub write_all_fields: bool,
    /// Operation mix
    #[serde(default)]
    pub proportions: ProportionsConfig,
    /// Key selection for read, update, delete and scan
    #[serde(default)]
    pub request_distribution: RequestDistributionConfig,
    /// Scan length selection
    #[serde(default)]
    pub scan: ScanConfig,
}

fn default_record_count() -> u64 {
    1000
}

fn default_key_prefix() -> String {
    "user".to_string()
}

fn default_zero_padding() -> usize {
    1
}

fn default_field_count() -> usize {
    10
}

fn default_field_prefix() -> String {
    crate::workload::DEFAULT_FIELD_PREFIX.to_string()
}

fn default_true() -> bool {
    true
}

fn default_theta() -> f64 {
    DEFAULT_ZIPFIAN_THETA
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            record_count: default_record_count(),
            insert_start: 0,
            insert_count: None,
            key_prefix: default_key_prefix(),
            insert_order: InsertOrder::default(),
            zero_padding: default_zero_padding(),
            field_count: default_field_count(),
            field_prefix: default_field_prefix(),
            field_length: FieldLengthConfig::default(),
            max_field_length: None,
            read_all_fields: true,
            write_all_fields: false,
            proportions: ProportionsConfig::default(),
            request_distribution: RequestDistributionConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

impl WorkloadConfig {
    /// Records the load phase inserts
    pub fn load_count(&self) -> u64 {
        self.insert_count.unwrap_or_else(|| self.record_count.saturating_sub(self.insert_start))
    }

    /// Check everything that does not need a backend
    pub fn validate(&self) -> Result<()> {
        if self.field_count == 0 {
            return Err(Error::config("workload.field_count must be > 0"));
        }
        if self.insert_count.is_none() && self.insert_start > self.record_count {
            return Err(Error::Config(format!(
                "workload.insert_start ({}) exceeds workload.record_count ({})",
                self.insert_start, self.record_count
            )));
        }
        self.field_length.validate()?;
        if self.max_field_length == Some(0) {
            return Err(Error::config("workload.max_field_length must be > 0"));
        }
        self.proportions.validate()?;
        self.request_distribution.validate()?;
        self.scan.validate()?;
        if self.proportions.scan > 0.0 && self.insert_order == InsertOrder::Hashed {
            tracing::warn!(
                "scans with hashed key order visit records in hash order, not insertion order"
            );
        }
        Ok(())
    }
}

/// Key naming scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum InsertOrder {
    /// `<prefix><fnv64(index)>`, spreads consecutive inserts across the keyspace
    #[default]
    Hashed,
    /// `<prefix><index>`, zero padded
    Ordered,
}

/// Value length distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(tag = "distribution", rename_all = "lowercase")]
pub enum FieldLengthConfig {
    Constant {
        length: usize,
    },
    Uniform {
        #[serde(default = "default_min_length")]
        min: usize,
        max: usize,
    },
    Zipfian {
        max: usize,
    },
}

fn default_min_length() -> usize {
    1
}

impl Default for FieldLengthConfig {
    fn default() -> Self {
        FieldLengthConfig::Constant { length: 100 }
    }
}

impl FieldLengthConfig {
    fn validate(&self) -> Result<()> {
        match self {
            FieldLengthConfig::Uniform { min, max } if min > max => Err(Error::Config(format!(
                "workload.field_length min ({min}) must be <= max ({max})"
            ))),
            FieldLengthConfig::Zipfian { max: 0 } => {
                Err(Error::config("workload.field_length max must be > 0"))
            }
            _ => Ok(()),
        }
    }
}

/// Relative operation weights
///
/// Weights need not sum to 1.0; they are normalized when the workload is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ProportionsConfig {
    #[serde(default)]
    pub read: f64,
    #[serde(default)]
    pub update: f64,
    #[serde(default)]
    pub insert: f64,
    #[serde(default)]
    pub scan: f64,
    #[serde(default)]
    pub delete: f64,
}

impl Default for ProportionsConfig {
    fn default() -> Self {
        Self { read: 0.95, update: 0.05, insert: 0.0, scan: 0.0, delete: 0.0 }
    }
}

impl ProportionsConfig {
    /// Weights in mix order
    pub fn weights(&self) -> [(OperationKind, f64); 5] {
        [
            (OperationKind::Read, self.read),
            (OperationKind::Update, self.update),
            (OperationKind::Insert, self.insert),
            (OperationKind::Scan, self.scan),
            (OperationKind::Delete, self.delete),
        ]
    }

    fn validate(&self) -> Result<()> {
        let mut total = 0.0;
        for (kind, weight) in self.weights() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::Config(format!(
                    "workload.proportions.{} must be a non-negative number, got {weight}",
                    kind.as_str().to_lowercase()
                )));
            }
            total += weight;
        }
        if total <= 0.0 {
            return Err(Error::config("workload.proportions are all zero"));
        }
        Ok(())
    }
}

/// Request (key selection) distribution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RequestDistributionConfig {
    #[default]
    Uniform,
    Zipfian {
        #[serde(default = "default_theta")]
        theta: f64,
    },
    Latest {
        #[serde(default = "default_theta")]
        theta: f64,
    },
    Hotspot {
        /// Fraction of the keyspace that is hot
        #[serde(default = "default_hot_set_fraction")]
        hot_set_fraction: f64,
        /// Fraction of requests sent to the hot set
        #[serde(default = "default_hot_op_fraction")]
        hot_op_fraction: f64,
    },
    Sequential,
}

fn default_hot_set_fraction() -> f64 {
    0.2
}

fn default_hot_op_fraction() -> f64 {
    0.8
}

impl RequestDistributionConfig {
    pub fn name(&self) -> &'static str {
        match self {
            RequestDistributionConfig::Uniform => "uniform",
            RequestDistributionConfig::Zipfian { .. } => "zipfian",
            RequestDistributionConfig::Latest { .. } => "latest",
            RequestDistributionConfig::Hotspot { .. } => "hotspot",
            RequestDistributionConfig::Sequential => "sequential",
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            RequestDistributionConfig::Zipfian { theta }
            | RequestDistributionConfig::Latest { theta } => validate_theta(*theta),
            RequestDistributionConfig::Hotspot { hot_set_fraction, hot_op_fraction } => {
                for (name, value) in
                    [("hot_set_fraction", hot_set_fraction), ("hot_op_fraction", hot_op_fraction)]
                {
                    if !(0.0..=1.0).contains(value) {
                        return Err(Error::Config(format!(
                            "workload.request_distribution.{name} must be in [0.0, 1.0], got {value}"
                        )));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn validate_theta(theta: f64) -> Result<()> {
    if !(0.0..1.0).contains(&theta) {
        return Err(Error::Config(format!("zipfian theta must be in [0.0, 1.0), got {theta}")));
    }
    Ok(())
}

/// Scan length selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ScanConfig {
    /// Longest scan, in records
    #[serde(default = "default_max_scan_length")]
    pub max_length: usize,
    #[serde(default)]
    pub length_distribution: ScanLengthDistribution,
}

fn default_max_scan_length() -> usize {
    1000
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { max_length: default_max_scan_length(), length_distribution: Default::default() }
    }
}

impl ScanConfig {
    fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(Error::config("workload.scan.max_length must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum ScanLengthDistribution {
    #[default]
    Uniform,
    Zipfian,
}

/// Inter-arrival model used when a target throughput is set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum RateModel {
    /// Evenly spaced sends
    #[default]
    Fixed,
    /// Exponential inter-arrival times
    Poisson,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: WorkloadConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, WorkloadConfig::default());
        assert_eq!(config.record_count, 1000);
        assert_eq!(config.field_count, 10);
        assert!(config.read_all_fields);
        assert!(!config.write_all_fields);
        assert_eq!(config.insert_order, InsertOrder::Hashed);
        assert_eq!(config.request_distribution, RequestDistributionConfig::Uniform);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_proportions_default_to_zero() {
        let config: WorkloadConfig =
            serde_json::from_str(r#"{"proportions": {"read": 0.5, "insert": 0.5}}"#).unwrap();
        assert_eq!(config.proportions.update, 0.0);
        assert_eq!(config.proportions.insert, 0.5);
    }

    #[test]
    fn test_tagged_distributions() {
        let config: WorkloadConfig = serde_json::from_str(
            r#"{
                "request_distribution": {"type": "hotspot", "hot_set_fraction": 0.1},
                "field_length": {"distribution": "uniform", "max": 64}
            }"#,
        )
        .unwrap();
        assert_eq!(
            config.request_distribution,
            RequestDistributionConfig::Hotspot { hot_set_fraction: 0.1, hot_op_fraction: 0.8 }
        );
        assert_eq!(config.field_length, FieldLengthConfig::Uniform { min: 1, max: 64 });

        let zipf: RequestDistributionConfig =
            serde_json::from_str(r#"{"type": "zipfian"}"#).unwrap();
        assert_eq!(zipf, RequestDistributionConfig::Zipfian { theta: 0.99 });
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = WorkloadConfig::default();
        config.proportions =
            ProportionsConfig { read: 0.0, update: 0.0, insert: 0.0, scan: 0.0, delete: 0.0 };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = WorkloadConfig::default();
        config.proportions.read = -1.0;
        assert!(config.validate().is_err());

        let mut config = WorkloadConfig::default();
        config.request_distribution = RequestDistributionConfig::Zipfian { theta: 1.0 };
        assert!(config.validate().is_err());

        let mut config = WorkloadConfig::default();
        config.field_length = FieldLengthConfig::Uniform { min: 10, max: 5 };
        assert!(config.validate().is_err());

        let mut config = WorkloadConfig::default();
        config.insert_start = 2000;
        assert!(config.validate().is_err());

        let mut config = WorkloadConfig::default();
        config.max_field_length = Some(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_count() {
        let mut config = WorkloadConfig::default();
        assert_eq!(config.load_count(), 1000);
        config.insert_start = 400;
        assert_eq!(config.load_count(), 600);
        config.insert_count = Some(100);
        assert_eq!(config.load_count(), 100);
    }
}
