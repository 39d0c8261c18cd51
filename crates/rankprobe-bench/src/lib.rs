//! Benchmark harness for predict-then-correct rank lookups.
//!
//! The harness loads a sorted key array and a position oracle, replays a
//! query file through one or more correction strategies, and appends the
//! measured latencies to an output file. It runs single-threaded and can
//! pin itself to one core so repeated runs are comparable.
//!
//! # Run lifecycle
//!
//! A [`BenchmarkRunner`] moves through [`RunPhase::Init`] (queries parsed),
//! [`RunPhase::Loaded`] (store mapped and oracle loaded),
//! [`RunPhase::Running`] (timed trials), [`RunPhase::Reporting`] and
//! [`RunPhase::Done`] (resources released). Load and parse failures are
//! fatal; a lookup never fails, it returns `NotFound`.
//!
//! # Output
//!
//! | Mode | One line per | Content |
//! |------|--------------|---------|
//! | `checkpoints` | strategy, scale and repeat | elapsed ms at each checkpoint, comma-separated |
//! | `histogram` | latency bucket | `strategy,scale,latency_ns,count` |
//! | `build-time` | run | `store_ms,oracle_ms` |

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod affinity;
pub mod commands;
pub mod config;
pub mod histogram;
pub mod perf;
pub mod queries;
pub mod report;
pub mod runner;
pub mod sample;
pub mod schedule;

pub use config::{Cli, Commands, FitConfig, LogLevel, OutputMode, RunConfig, SampleConfig, TimingMode};
pub use histogram::LatencyHistogram;
pub use perf::ResourceUsage;
pub use runner::{
    BenchmarkRunner, BuildTimes, Checkpoint, ErrorSample, RunOutcome, RunPhase, RunSettings,
    TrialReport,
};
pub use schedule::CheckpointSchedule;

use rankprobe_oracle::OracleError;
use rankprobe_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, BenchError>;

/// Errors that abort a benchmark run
#[derive(Debug, Error)]
pub enum BenchError {
    /// Query file could not be read
    #[error("Failed to read queries from {path}: {source}")]
    QueryIo {
        /// Query file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Query file holds a line that is not a key
    #[error("Invalid key '{content}' at {path}:{line}")]
    QueryParse {
        /// Query file path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Offending line
        content: String,
    },

    /// Output file could not be written
    #[error("Failed to write {path}: {source}")]
    Output {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Data file failed to load
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Oracle failed to load, fit or resolve
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// No oracle given and none matches the data file name
    #[error("No oracle given and none registered for {data}")]
    NoOracle {
        /// Data file path
        data: PathBuf,
    },

    /// Runner method called in the wrong phase
    #[error("Runner is in phase {actual:?}, expected {expected:?}")]
    Phase {
        /// Phase the call needs
        expected: RunPhase,
        /// Phase the runner is in
        actual: RunPhase,
    },

    /// Process could not be pinned to a core
    #[error("Failed to pin to core {core}: {source}")]
    Affinity {
        /// Requested core
        core: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Latency histogram could not be created
    #[error("Failed to create latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),

    /// Configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),
}
