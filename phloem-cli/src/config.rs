//! Profile files
//!
//! A profile is a TOML file describing one experiment: how to drive the
//! backend (`[experiment]`), what to generate (`[workload]`), which backend to
//! talk to (`[backend]`) and where results go (`[output]`). Any value can be
//! overridden from the command line with `--set path=value`.

use anyhow::{bail, Context, Result};
use phloem_bindings::BackendRegistry;
use phloem_core::config::{RateModel, WorkloadConfig};
use phloem_core::threading::{ExecutorConfig, RunLimit};
use phloem_core::workload::Phase;
use phloem_core::Properties;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level profile configuration
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ProfileConfig {
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// How the executor drives the backend
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ExperimentConfig {
    /// Experiment name
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Master seed for reproducibility (None = use entropy)
    #[serde(default)]
    pub seed: Option<u64>,
    /// Worker threads, one backend instance each
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Operations for the run phase across all workers
    #[serde(default)]
    pub operation_count: Option<u64>,
    /// Wall-clock cap for either phase
    #[serde(with = "humantime_serde", default)]
    #[schemars(with = "Option<String>")]
    pub max_execution_time: Option<Duration>,
    /// Total operations per second (absent = as fast as possible)
    #[serde(default)]
    pub target_throughput: Option<f64>,
    #[serde(default)]
    pub rate_model: RateModel,
    /// Progress log period (absent = no progress lines)
    #[serde(with = "humantime_serde", default)]
    #[schemars(with = "Option<String>")]
    pub status_interval: Option<Duration>,
    /// Table name passed to every backend call
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_threads() -> usize {
    1
}

fn default_table() -> String {
    "usertable".to_string()
}

/// Backend selection
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct BackendConfig {
    /// Registered backend name (see `phloem backends`)
    pub name: String,
    /// Backend properties. Nested tables flatten to dotted names, so
    /// `[backend.properties.redis] host = "h"` sets `redis.host`.
    #[serde(default)]
    #[schemars(with = "BTreeMap<String, serde_json::Value>")]
    pub properties: toml::Table,
}

impl BackendConfig {
    /// Flatten the property table into the string map backends receive
    pub fn properties(&self) -> Result<Properties> {
        let mut out = Properties::new();
        flatten_properties("", &self.properties, &mut out)?;
        Ok(out)
    }
}

fn flatten_properties(prefix: &str, table: &toml::Table, out: &mut Properties) -> Result<()> {
    for (key, value) in table {
        let name = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        let text = match value {
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Table(nested) => {
                flatten_properties(&name, nested, out)?;
                continue;
            }
            toml::Value::Array(_) => bail!("Backend property '{}' cannot be an array", name),
        };
        out.insert(name, text);
    }
    Ok(())
}

/// Report format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary on stdout
    #[default]
    Text,
    /// Text summary plus the full report as JSON
    Json,
}

/// Output configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// JSON destination (stdout when absent)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl ProfileConfig {
    /// Load profile from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ProfileConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load profile from TOML file with --set style overrides, then validate
    pub fn from_file_with_overrides<P: AsRef<Path>>(path: P, overrides: &[String]) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut value: toml::Value = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        for override_str in overrides {
            let (key, val) = parse_key_value(override_str)
                .with_context(|| format!("Invalid override format: {}", override_str))?;

            set_toml_path(&mut value, &key, &val)
                .with_context(|| format!("Failed to apply override: {}", override_str))?;
        }

        let config: ProfileConfig = value
            .try_into()
            .with_context(|| "Failed to deserialize modified configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Check everything that does not need a live backend
    pub fn validate(&self) -> Result<()> {
        let experiment = &self.experiment;
        if experiment.name.is_empty() {
            bail!("Experiment name cannot be empty");
        }
        if experiment.threads == 0 {
            bail!("experiment.threads must be > 0");
        }
        if experiment.operation_count.is_none() && experiment.max_execution_time.is_none() {
            bail!("Set experiment.operation_count, experiment.max_execution_time, or both");
        }
        if experiment.max_execution_time.is_some_and(|d| d.is_zero()) {
            bail!("experiment.max_execution_time must be > 0");
        }
        if let Some(rate) = experiment.target_throughput {
            if !(rate.is_finite() && rate > 0.0) {
                bail!("experiment.target_throughput must be > 0, got {}", rate);
            }
        }
        if experiment.status_interval.is_some_and(|d| d.is_zero()) {
            bail!("experiment.status_interval must be > 0");
        }
        if experiment.table.is_empty() {
            bail!("experiment.table cannot be empty");
        }

        self.workload.validate()?;

        let registry = BackendRegistry::with_builtin();
        let factory = registry.factory(&self.backend.name)?;
        factory.validate(&self.backend.properties()?)?;

        Ok(())
    }

    /// Executor settings for one phase
    ///
    /// The load phase inserts `workload.load_count()` records; the run phase
    /// runs `experiment.operation_count` operations. Either is capped by
    /// `max_execution_time`.
    pub fn executor_config(&self, phase: Phase) -> ExecutorConfig {
        let experiment = &self.experiment;
        let operations = match phase {
            Phase::Load => Some(self.workload.load_count()),
            Phase::Run => experiment.operation_count,
        };
        ExecutorConfig {
            threads: experiment.threads,
            limit: RunLimit { operations, duration: experiment.max_execution_time },
            target_throughput: experiment.target_throughput,
            rate_model: experiment.rate_model,
            status_interval: experiment.status_interval,
            table: experiment.table.clone(),
            seed: experiment.seed,
        }
    }
}

/// Parse a "key=value" string into (key, value) tuple
fn parse_key_value(override_str: &str) -> Result<(String, String)> {
    match override_str.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("Invalid override format '{}'. Expected 'key=value'", override_str),
    }
}

/// Set a value in TOML using dot-notation path
fn set_toml_path(root: &mut toml::Value, path: &str, value_str: &str) -> Result<()> {
    let parts = parse_path(path);
    let Some((last, parents)) = parts.split_last() else {
        bail!("Empty path");
    };

    let mut current = root;
    for part in parents {
        current = match part {
            PathSegment::Key(key) => {
                let toml::Value::Table(table) = current else {
                    bail!("Cannot navigate through non-table value at key '{}'", key);
                };
                table
                    .entry(key.clone())
                    .or_insert_with(|| toml::Value::Table(Default::default()))
            }
            PathSegment::Index(idx) => {
                let toml::Value::Array(arr) = current else {
                    bail!("Cannot index non-array value");
                };
                let len = arr.len();
                arr.get_mut(*idx).with_context(|| {
                    format!("Array index {} out of bounds (length: {})", idx, len)
                })?
            }
            PathSegment::Append => bail!("Append operation '+' can only be at the end of path"),
        };
    }

    let parsed_value = parse_value(value_str)?;
    match (last, current) {
        (PathSegment::Key(key), toml::Value::Table(table)) => {
            table.insert(key.clone(), parsed_value);
        }
        (PathSegment::Key(key), _) => bail!("Cannot set key '{}' on non-table value", key),
        (PathSegment::Index(idx), toml::Value::Array(arr)) => {
            let len = arr.len();
            let slot = arr.get_mut(*idx).with_context(|| {
                format!("Array index {} out of bounds (length: {})", idx, len)
            })?;
            *slot = parsed_value;
        }
        (PathSegment::Index(_), _) => bail!("Cannot index non-array value"),
        (PathSegment::Append, toml::Value::Array(arr)) => arr.push(parsed_value),
        (PathSegment::Append, _) => bail!("Cannot append to non-array value"),
    }
    Ok(())
}

/// Path segment types
#[derive(Debug, PartialEq)]
enum PathSegment {
    Key(String),
    Index(usize),
    Append,
}

/// Parse a path string into segments (handles "key", "0", "+")
fn parse_path(path: &str) -> Vec<PathSegment> {
    path.split('.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part == "+" {
                PathSegment::Append
            } else if let Ok(idx) = part.parse::<usize>() {
                PathSegment::Index(idx)
            } else {
                PathSegment::Key(part.to_string())
            }
        })
        .collect()
}

/// Parse a string value with type inference
fn parse_value(value_str: &str) -> Result<toml::Value> {
    let trimmed = value_str.trim();

    if trimmed == "true" {
        return Ok(toml::Value::Boolean(true));
    }
    if trimmed == "false" {
        return Ok(toml::Value::Boolean(false));
    }

    if let Ok(int_val) = trimmed.parse::<i64>() {
        return Ok(toml::Value::Integer(int_val));
    }

    if let Ok(float_val) = trimmed.parse::<f64>() {
        if float_val.is_finite() {
            return Ok(toml::Value::Float(float_val));
        }
    }

    if (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('{') && trimmed.ends_with('}'))
    {
        let wrapped = format!("value = {}", trimmed);
        if let Ok(mut table) = toml::from_str::<toml::Table>(&wrapped) {
            if let Some(value) = table.remove("value") {
                return Ok(value);
            }
        }
        bail!("Failed to parse inline value: {}", trimmed);
    }

    let string_val = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    Ok(toml::Value::String(string_val.to_string()))
}
