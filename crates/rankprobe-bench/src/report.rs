//! Result output.
//!
//! Results are appended, so repeated invocations accumulate in one file.

use crate::config::OutputMode;
use crate::runner::{BuildTimes, RunOutcome, TrialReport};
use crate::{BenchError, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends result lines to a file.
#[derive(Debug)]
pub struct ReportWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ReportWriter {
    /// Open `path` for appending, creating it if needed.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| BenchError::Output {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Write everything `outcome` holds in the form `mode` asks for.
    pub fn write_outcome(&mut self, mode: OutputMode, outcome: &RunOutcome) -> Result<()> {
        match mode {
            OutputMode::Checkpoints => {
                for trial in &outcome.trials {
                    self.write_checkpoints(trial)?;
                }
            }
            OutputMode::Histogram => {
                for trial in &outcome.trials {
                    self.write_histogram(trial)?;
                }
            }
            OutputMode::BuildTime => self.write_build_times(&outcome.build)?,
        }
        Ok(())
    }

    /// One line: elapsed milliseconds at each checkpoint, comma-separated.
    pub fn write_checkpoints(&mut self, trial: &TrialReport) -> Result<()> {
        let line = trial
            .checkpoints
            .iter()
            .map(|c| c.elapsed_ms().to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.line(&line)
    }

    /// One `strategy,scale,latency_ns,count` row per latency bucket.
    pub fn write_histogram(&mut self, trial: &TrialReport) -> Result<()> {
        let Some(histogram) = &trial.histogram else {
            return Ok(());
        };
        for (latency_ns, count) in histogram.buckets() {
            let row = format!("{},{},{latency_ns},{count}", trial.strategy, trial.scale);
            self.line(&row)?;
        }
        Ok(())
    }

    /// One line: `store_ms,oracle_ms`.
    pub fn write_build_times(&mut self, build: &BuildTimes) -> Result<()> {
        let line = format!(
            "{},{}",
            build.store_ns as f64 / 1_000_000.0,
            build.oracle_ns as f64 / 1_000_000.0
        );
        self.line(&line)
    }

    /// Flush buffered lines.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush().map_err(|source| BenchError::Output {
            path: self.path.clone(),
            source,
        })
    }

    fn line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{line}").map_err(|source| BenchError::Output {
            path: self.path.clone(),
            source,
        })
    }
}
