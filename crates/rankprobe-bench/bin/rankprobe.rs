//! rankprobe binary entry point.
//!
//! This is a thin wrapper around the rankprobe-bench library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Validates configuration and pins to a core if asked
//! 4. Dispatches the subcommand
//!
//! Any fatal error is printed with its cause chain and the process exits
//! non-zero.

use anyhow::{Context, Result};
use clap::Parser;
use rankprobe_bench::affinity::pin_to_core;
use rankprobe_bench::{Cli, Commands, commands};
use rankprobe_oracle::OracleRegistry;
use tracing::Level;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --log-level
    let level = Level::from(cli.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_str())),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(config) => {
            config.validate()?;
            if let Some(core) = config.pin_target() {
                pin_to_core(core)?;
            }

            let registry = OracleRegistry::with_defaults();
            let outcome = commands::run(&config, &registry).with_context(|| {
                format!("benchmark run on {} failed", config.source.data.display())
            })?;
            tracing::info!(
                "Finished {} pass(es), results in {}",
                outcome.trials.len(),
                config.output.display()
            );
        }
        Commands::Fit(config) => {
            config.validate()?;
            commands::fit(&config)
                .with_context(|| format!("fitting {} failed", config.source.data.display()))?;
        }
        Commands::Sample(config) => {
            config.validate()?;
            commands::sample(&config)
                .with_context(|| format!("sampling {} failed", config.source.data.display()))?;
        }
    }

    Ok(())
}
