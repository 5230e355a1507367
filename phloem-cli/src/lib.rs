//! phloem CLI library
//!
//! Profile loading, phase execution and report formatting behind the `phloem`
//! binary, exposed for tests and reuse.

pub mod config;
pub mod output;

use anyhow::{Context, Result};
use config::ProfileConfig;
use output::PhaseResults;
use phloem_bindings::BackendRegistry;
use phloem_core::stats::Measurements;
use phloem_core::threading::{CancellationToken, Executor};
use phloem_core::workload::{Phase, Workload};
use phloem_core::{DbFactory, Properties};
use std::sync::Arc;
use tracing::{info, warn};

/// A profile bound to its backend factory
///
/// Phases run through one `Experiment` share the factory, so an in-process
/// backend keeps the records a load phase inserted for the following run.
pub struct Experiment {
    config: ProfileConfig,
    factory: Arc<dyn DbFactory>,
    properties: Properties,
    cancel: CancellationToken,
}

impl Experiment {
    pub fn new(config: ProfileConfig, registry: &BackendRegistry) -> Result<Self> {
        let factory = registry.factory(&config.backend.name)?;
        let properties = config.backend.properties()?;
        Ok(Self { config, factory, properties, cancel: CancellationToken::new() })
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Token that stops the phase in progress
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one phase to completion and collect its results
    ///
    /// Fails before any worker starts when the workload or the backend cannot
    /// be set up. Failed operations during the run are part of the results.
    pub fn run_phase(&self, phase: Phase) -> Result<PhaseResults> {
        let experiment = &self.config.experiment;
        let expected_ops = match phase {
            Phase::Load => None,
            Phase::Run => experiment.operation_count,
        };

        let workload =
            Workload::from_config(&self.config.workload, phase, experiment.seed, expected_ops)
                .context("Invalid workload")?;
        let executor = Executor::new(self.config.executor_config(phase))?;
        let measurements = Measurements::new()?;

        info!(
            "Starting {} phase: backend={}, threads={}, table={}",
            phase.as_str(),
            self.factory.name(),
            experiment.threads,
            experiment.table
        );

        let report = executor
            .run(
                self.factory.as_ref(),
                &self.properties,
                Arc::new(workload),
                Arc::new(measurements),
                &self.cancel,
            )
            .with_context(|| format!("{} phase failed", phase.as_str()))?;

        if report.stats.failures > 0 {
            warn!(
                "{} operation(s) failed during the {} phase",
                report.stats.failures,
                phase.as_str()
            );
        }

        Ok(PhaseResults::new(
            &experiment.name,
            phase.as_str(),
            self.factory.name(),
            experiment.threads,
            report,
        ))
    }
}
