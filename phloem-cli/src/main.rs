use anyhow::Result;
use clap::{Parser, Subcommand};
use phloem_bindings::BackendRegistry;
use phloem_cli::config::{OutputFormat, ProfileConfig};
use phloem_cli::output::PhaseResults;
use phloem_cli::Experiment;
use phloem_core::workload::Phase;
use schemars::schema_for;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// phloem: key-value store benchmark harness
///
/// A profile (TOML) describes the workload, the backend and how hard to drive
/// it. `load` populates the store, `run` executes the operation mix.
///
/// Example usage:
///   phloem load -P profiles/memory-workloada.toml
///   phloem run -P profiles/memory-workloada.toml --load
///   phloem run -P profiles/redis-workloadb.toml --set backend.properties.redis.host=10.0.0.5
///   phloem run -P profiles/redis-workloadb.toml --set experiment.threads=8 --set experiment.max_execution_time=30s
///
/// Override any config value using dot notation:
///   --set experiment.target_throughput=5000
///   --set workload.request_distribution.type=zipfian
///   --set workload.proportions.read=0.95
#[derive(Parser)]
#[command(name = "phloem")]
#[command(version, about = "Key-value store benchmark harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate the store with the profile's records
    Load {
        /// Path to TOML profile configuration file
        #[arg(short = 'P', long, required = true)]
        profile: PathBuf,

        /// Override any configuration value using dot notation (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Execute the profile's operation mix
    Run {
        /// Path to TOML profile configuration file
        #[arg(short = 'P', long, required = true)]
        profile: PathBuf,

        /// Override any configuration value using dot notation (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Run the load phase first, in the same process
        #[arg(long)]
        load: bool,
    },

    /// Generate JSON Schema for profile files
    Schema,

    /// List the registered backends
    Backends,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Load { profile, set } => run_experiment(&profile, &set, &[Phase::Load]),
        Commands::Run { profile, set, load } => {
            let phases: &[Phase] = if load { &[Phase::Load, Phase::Run] } else { &[Phase::Run] };
            run_experiment(&profile, &set, phases)
        }
        Commands::Schema => {
            let schema = schema_for!(ProfileConfig);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
        Commands::Backends => {
            for name in BackendRegistry::with_builtin().backends() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn run_experiment(profile: &Path, set: &[String], phases: &[Phase]) -> Result<()> {
    tracing::info!("Loading profile: {}", profile.display());
    let config = ProfileConfig::from_file_with_overrides(profile, set)?;

    tracing::info!("Experiment: {}", config.experiment.name);
    if let Some(desc) = &config.experiment.description {
        tracing::info!("Description: {}", desc);
    }
    if let Some(seed) = config.experiment.seed {
        tracing::info!("Seed: {} (reproducible mode)", seed);
    }

    let experiment = Experiment::new(config, &BackendRegistry::with_builtin())?;
    for &phase in phases {
        let results = experiment.run_phase(phase)?;
        report(&experiment, &results)?;
    }
    Ok(())
}

fn report(experiment: &Experiment, results: &PhaseResults) -> Result<()> {
    results.print_human();
    let output = &experiment.config().output;
    if output.format == OutputFormat::Json {
        results.write_json(output.file.as_deref())?;
    }
    Ok(())
}
