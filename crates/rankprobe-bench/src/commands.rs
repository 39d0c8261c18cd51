//! Subcommand handlers.

use crate::config::{FitConfig, ModelKind, RunConfig, SampleConfig};
use crate::queries::{load_queries, write_queries};
use crate::runner::{BenchmarkRunner, RunOutcome};
use crate::sample::sample_queries;
use crate::{BenchError, Result};
use rankprobe_oracle::{ErrorSummary, OracleModel, OracleRegistry};
use rankprobe_store::{Key, KeyWidth};
use std::time::Instant;
use tracing::{info, warn};

/// Run a benchmark end to end and append its results to the output file.
pub fn run(config: &RunConfig, registry: &OracleRegistry) -> Result<RunOutcome> {
    match config.source.width() {
        KeyWidth::U32 => run_typed::<u32>(config, registry),
        KeyWidth::U64 => run_typed::<u64>(config, registry),
    }
}

fn run_typed<K: Key>(config: &RunConfig, registry: &OracleRegistry) -> Result<RunOutcome> {
    let oracle_id = match &config.oracle {
        Some(id) => id.clone(),
        None => registry
            .resolve(&config.source.data)
            .map(str::to_string)
            .ok_or_else(|| BenchError::NoOracle {
                data: config.source.data.clone(),
            })?,
    };
    let oracle = registry.create(&oracle_id)?;

    let queries = load_queries::<K>(&config.queries)?;
    info!(
        "Running {} {} queries against {} with oracle '{}'",
        queries.len(),
        K::WIDTH,
        config.source.data.display(),
        oracle_id
    );

    let mut runner = BenchmarkRunner::new(config.settings(), queries);
    runner.load(&config.source, oracle, config.artifact.as_deref())?;
    runner.execute()?;
    let outcome = runner.report(&config.output)?;
    runner.finish();

    Ok(outcome)
}

/// Fit a model to the data file and write its artifact.
pub fn fit(config: &FitConfig) -> Result<ErrorSummary> {
    match config.source.width() {
        KeyWidth::U32 => fit_typed::<u32>(config),
        KeyWidth::U64 => fit_typed::<u64>(config),
    }
}

fn fit_typed<K: Key>(config: &FitConfig) -> Result<ErrorSummary> {
    let store = config.source.open::<K>()?;
    let keys = store.keys();

    let start = Instant::now();
    let model = match config.model {
        ModelKind::Linear => OracleModel::fit_linear(keys)?,
        ModelKind::Rmi => OracleModel::fit_rmi(keys, config.branching)?,
    };
    info!(
        "Fitted {} model over {} keys in {:.2?}",
        model.kind(),
        keys.len(),
        start.elapsed()
    );

    let summary = model.evaluate(keys);
    info!(
        "Average error {:.2}, maximum error {} over {} distinct keys",
        summary.mean_error, summary.max_error, summary.keys
    );
    if summary.violations > 0 {
        warn!("{} key(s) fall outside their stated bound", summary.violations);
    }

    model.save(&config.output)?;
    info!("Wrote artifact to {}", config.output.display());
    Ok(summary)
}

/// Sample a query file from the data file. Returns the number of queries.
pub fn sample(config: &SampleConfig) -> Result<usize> {
    match config.source.width() {
        KeyWidth::U32 => sample_typed::<u32>(config),
        KeyWidth::U64 => sample_typed::<u64>(config),
    }
}

fn sample_typed<K: Key>(config: &SampleConfig) -> Result<usize> {
    let store = config.source.open::<K>()?;
    let queries = sample_queries(&store, config.count, config.absent, config.seed);
    write_queries(&config.output, &queries)?;

    info!(
        "Wrote {} queries to {}",
        queries.len(),
        config.output.display()
    );
    Ok(queries.len())
}
