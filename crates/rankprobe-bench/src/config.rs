//! Command-line and environment configuration.
//!
//! Every flag can also be set through a `RANKPROBE_*` environment variable.
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use rankprobe_bench::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! if let Commands::Run(config) = &cli.command {
//!     config.validate().expect("Invalid configuration");
//!     println!("Replaying {} against {}", config.queries.display(), config.source.data.display());
//! }
//! ```

use crate::runner::RunSettings;
use crate::schedule::CheckpointSchedule;
use crate::{BenchError, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use rankprobe_search::Strategy;
use rankprobe_store::{Key, KeyStore, KeyWidth};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Top-level command line.
#[derive(Debug, Parser)]
#[command(
    name = "rankprobe",
    about = "Benchmark predict-then-correct rank lookups over sorted key arrays",
    version
)]
pub struct Cli {
    /// Logging level when RUST_LOG is unset
    #[arg(
        short,
        long,
        value_enum,
        global = true,
        env = "RANKPROBE_LOG_LEVEL",
        default_value = "info"
    )]
    pub log_level: LogLevel,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a query file and record lookup latencies
    Run(RunConfig),
    /// Fit an oracle model to a data file and write its artifact
    Fit(FitConfig),
    /// Sample a query file from a data file
    Sample(SampleConfig),
}

/// Logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Everything
    Trace,
    /// Per-run detail
    Debug,
    /// Phases and summaries
    Info,
    /// Bound violations and mismatches
    Warn,
    /// Failures only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Key width as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WidthArg {
    /// 32-bit keys
    #[value(name = "u32", alias = "uint32")]
    U32,
    /// 64-bit keys
    #[value(name = "u64", alias = "uint64")]
    U64,
}

impl From<WidthArg> for KeyWidth {
    fn from(width: WidthArg) -> Self {
        match width {
            WidthArg::U32 => Self::U32,
            WidthArg::U64 => Self::U64,
        }
    }
}

/// What the timed region covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimingMode {
    /// Oracle lookup and correction search together
    Combined,
    /// Oracle lookup only
    Oracle,
    /// Correction search only, estimates computed beforehand
    Correction,
}

/// What a run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Cumulative elapsed time at each checkpoint
    Checkpoints,
    /// Per-query latency histogram
    Histogram,
    /// Store open and oracle load times only
    BuildTime,
}

/// Which model `fit` produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// One linear model
    Linear,
    /// Two-layer linear RMI
    Rmi,
}

/// Data file and how to read it.
#[derive(Debug, Clone, Args)]
pub struct DataSource {
    /// Sorted key array
    #[arg(long, env = "RANKPROBE_DATA")]
    pub data: PathBuf,

    /// Key width; inferred from a `uint32` marker in the file name when unset
    #[arg(long, value_enum, env = "RANKPROBE_KEY_WIDTH")]
    pub key_width: Option<WidthArg>,

    /// Treat the file as headerless and read this many keys
    #[arg(long, env = "RANKPROBE_HEADERLESS_SIZE")]
    pub headerless_size: Option<usize>,
}

impl DataSource {
    /// Source for a counted data file.
    pub fn new(data: impl Into<PathBuf>) -> Self {
        Self {
            data: data.into(),
            key_width: None,
            headerless_size: None,
        }
    }

    /// Effective key width.
    pub fn width(&self) -> KeyWidth {
        self.key_width.map_or_else(
            || {
                let name = self
                    .data
                    .file_name()
                    .map(|n| n.to_string_lossy())
                    .unwrap_or_default();
                KeyWidth::from_file_name(&name)
            },
            KeyWidth::from,
        )
    }

    /// Open the data file.
    pub fn open<K: Key>(&self) -> Result<KeyStore<K>> {
        let store = match self.headerless_size {
            Some(len) => KeyStore::open_headerless(&self.data, len)?,
            None => KeyStore::open(&self.data)?,
        };
        Ok(store)
    }

    fn check(&self) -> Result<()> {
        require_file("data file", &self.data)
    }
}

/// Configuration for `rankprobe run`.
#[derive(Debug, Clone, Args)]
pub struct RunConfig {
    /// Data file
    #[command(flatten)]
    pub source: DataSource,

    /// Query file, one decimal key per line
    #[arg(long, env = "RANKPROBE_QUERIES")]
    pub queries: PathBuf,

    /// Oracle id; resolved from the data file name when unset
    #[arg(long, env = "RANKPROBE_ORACLE")]
    pub oracle: Option<String>,

    /// Oracle artifact
    #[arg(long, env = "RANKPROBE_ARTIFACT")]
    pub artifact: Option<PathBuf>,

    /// File the results are appended to
    #[arg(long, env = "RANKPROBE_OUTPUT", default_value = "results.txt")]
    pub output: PathBuf,

    /// Passes over the query file per strategy and scale
    #[arg(long, env = "RANKPROBE_REPEATS", default_value_t = 1)]
    pub repeats: usize,

    /// Correction strategies to measure
    #[arg(
        long = "strategy",
        env = "RANKPROBE_STRATEGIES",
        value_delimiter = ',',
        default_value = "binary"
    )]
    pub strategies: Vec<Strategy>,

    /// Multipliers applied to the oracle's error bound
    #[arg(
        long = "scale",
        env = "RANKPROBE_SCALES",
        value_delimiter = ',',
        default_value = "1"
    )]
    pub scales: Vec<f64>,

    /// What the timed region covers
    #[arg(long, value_enum, env = "RANKPROBE_TIMING", default_value = "combined")]
    pub timing: TimingMode,

    /// What to report
    #[arg(long, value_enum, env = "RANKPROBE_MODE", default_value = "checkpoints")]
    pub mode: OutputMode,

    /// Record page faults and context switches around each timed pass
    #[arg(long, env = "RANKPROBE_PERF")]
    pub perf: bool,

    /// Check every returned rank against a full binary search
    #[arg(long, env = "RANKPROBE_VALIDATE")]
    pub validate: bool,

    /// Pin the process to this core before loading
    #[arg(long, env = "RANKPROBE_PIN_CORE", default_value_t = 0)]
    pub pin_core: usize,

    /// Leave the process unpinned
    #[arg(long, env = "RANKPROBE_NO_PIN", conflicts_with = "pin_core")]
    pub no_pin: bool,

    /// Checkpoints are taken at powers of two below this query count
    #[arg(long, env = "RANKPROBE_CHECKPOINT_THRESHOLD", default_value_t = 1000)]
    pub checkpoint_threshold: usize,

    /// Checkpoint spacing at and above the threshold
    #[arg(long, env = "RANKPROBE_CHECKPOINT_INTERVAL", default_value_t = 1000)]
    pub checkpoint_interval: usize,

    /// Sample the oracle's error every this many queries (0 disables)
    #[arg(long, env = "RANKPROBE_DIAGNOSTIC_INTERVAL", default_value_t = 10_000)]
    pub diagnostic_interval: usize,
}

impl RunConfig {
    /// Minimal configuration with defaults for everything but the inputs.
    pub fn new(data: impl Into<PathBuf>, queries: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: DataSource::new(data),
            queries: queries.into(),
            oracle: None,
            artifact: None,
            output: output.into(),
            repeats: 1,
            strategies: vec![Strategy::BoundedBinary],
            scales: vec![1.0],
            timing: TimingMode::Combined,
            mode: OutputMode::Checkpoints,
            perf: false,
            validate: false,
            pin_core: 0,
            no_pin: false,
            checkpoint_threshold: 1000,
            checkpoint_interval: 1000,
            diagnostic_interval: 10_000,
        }
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `BenchError::Config` if:
    /// - The data, query or artifact file doesn't exist
    /// - No strategies or scales are given, or a scale is not positive
    /// - Repeats, checkpoint threshold or interval is zero
    pub fn validate(&self) -> Result<()> {
        self.source.check()?;
        require_file("query file", &self.queries)?;
        if let Some(artifact) = &self.artifact {
            require_file("oracle artifact", artifact)?;
        }

        if self.repeats == 0 {
            return Err(BenchError::Config("repeats must be at least 1".to_string()));
        }
        if self.strategies.is_empty() {
            return Err(BenchError::Config("no strategies selected".to_string()));
        }
        if self.scales.is_empty() {
            return Err(BenchError::Config("no error scales given".to_string()));
        }
        if let Some(scale) = self.scales.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(BenchError::Config(format!(
                "error scale must be positive, got {scale}"
            )));
        }
        if self.checkpoint_threshold == 0 || self.checkpoint_interval == 0 {
            return Err(BenchError::Config(
                "checkpoint threshold and interval must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Core to pin to before loading, unless pinning is disabled.
    pub fn pin_target(&self) -> Option<usize> {
        (!self.no_pin).then_some(self.pin_core)
    }

    /// Runner settings derived from this configuration.
    pub fn settings(&self) -> RunSettings {
        let mut strategies = self.strategies.clone();
        dedup_preserving_order(&mut strategies);

        RunSettings {
            repeats: self.repeats,
            strategies,
            scales: self.scales.clone(),
            timing: self.timing,
            mode: self.mode,
            schedule: CheckpointSchedule::new(self.checkpoint_threshold, self.checkpoint_interval),
            diagnostic_interval: self.diagnostic_interval,
            validate: self.validate,
            perf: self.perf,
        }
    }
}

/// Configuration for `rankprobe fit`.
#[derive(Debug, Clone, Args)]
pub struct FitConfig {
    /// Data file
    #[command(flatten)]
    pub source: DataSource,

    /// Artifact to write
    #[arg(long, env = "RANKPROBE_ARTIFACT")]
    pub output: PathBuf,

    /// Model to fit
    #[arg(long, value_enum, env = "RANKPROBE_MODEL", default_value = "rmi")]
    pub model: ModelKind,

    /// Number of RMI leaf models
    #[arg(long, env = "RANKPROBE_BRANCHING", default_value_t = 1024)]
    pub branching: usize,
}

impl FitConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.source.check()?;
        if self.model == ModelKind::Rmi && self.branching == 0 {
            return Err(BenchError::Config(
                "branching factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for `rankprobe sample`.
#[derive(Debug, Clone, Args)]
pub struct SampleConfig {
    /// Data file
    #[command(flatten)]
    pub source: DataSource,

    /// Query file to write
    #[arg(long, env = "RANKPROBE_QUERIES")]
    pub output: PathBuf,

    /// Number of keys drawn from the data file
    #[arg(long, env = "RANKPROBE_COUNT", default_value_t = 1_000_000)]
    pub count: usize,

    /// Number of keys absent from the data file to mix in
    #[arg(long, env = "RANKPROBE_ABSENT", default_value_t = 0)]
    pub absent: usize,

    /// Random seed
    #[arg(long, env = "RANKPROBE_SEED", default_value_t = 42)]
    pub seed: u64,
}

impl SampleConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        self.source.check()
    }
}

fn require_file(what: &str, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BenchError::Config(format!(
            "{what} not found: {}",
            path.display()
        )))
    }
}

fn dedup_preserving_order(strategies: &mut Vec<Strategy>) {
    let mut seen = Vec::with_capacity(strategies.len());
    strategies.retain(|s| {
        if seen.contains(s) {
            false
        } else {
            seen.push(*s);
            true
        }
    });
}
