//! End-to-end runs through the subcommand handlers.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use pretty_assertions::assert_eq;
use rankprobe_bench::commands;
use rankprobe_bench::config::{DataSource, FitConfig, ModelKind, SampleConfig};
use rankprobe_bench::{BenchError, OutputMode, RunConfig, TimingMode};
use rankprobe_oracle::OracleRegistry;
use rankprobe_search::Strategy;
use rankprobe_store::{Layout, write_key_file};
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

struct Fixture {
    dir: TempDir,
    data: PathBuf,
    queries: PathBuf,
    artifact: PathBuf,
}

impl Fixture {
    /// Data file, sampled queries and a fitted RMI.
    fn new(name: &str) -> Self {
        let dir = tempdir().expect("Failed to create temporary directory");
        let data = dir.path().join(name);
        let keys: Vec<u64> = (0..50_000u64).map(|i| i * i / 3 + i).collect();
        write_key_file(&data, &keys, Layout::Counted).expect("Failed to write data file");

        let queries = dir.path().join("queries.txt");
        commands::sample(&SampleConfig {
            source: DataSource::new(&data),
            output: queries.clone(),
            count: 5_000,
            absent: 500,
            seed: 3,
        })
        .expect("Failed to sample queries");

        let artifact = dir.path().join("model.json");
        let summary = commands::fit(&FitConfig {
            source: DataSource::new(&data),
            output: artifact.clone(),
            model: ModelKind::Rmi,
            branching: 256,
        })
        .expect("Failed to fit model");
        assert_eq!(summary.violations, 0);

        Self {
            dir,
            data,
            queries,
            artifact,
        }
    }

    fn output(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self, output: &Path) -> RunConfig {
        let mut config = RunConfig::new(&self.data, &self.queries, output);
        config.oracle = Some("rmi".to_string());
        config.artifact = Some(self.artifact.clone());
        config
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_checkpoint_run_appends_one_line_per_pass() {
    let fixture = Fixture::new("keys_uint64");
    let output = fixture.output("results.txt");
    let mut config = fixture.config(&output);
    config.strategies = vec![Strategy::BoundedBinary, Strategy::BoundedLinear];
    config.scales = vec![1.0, 2.0];
    config.repeats = 2;
    config.validate = true;
    config.perf = true;
    config.validate().unwrap();

    let outcome = commands::run(&config, &OracleRegistry::with_defaults()).unwrap();
    assert_eq!(outcome.trials.len(), 8);
    for trial in &outcome.trials {
        assert_eq!(trial.queries, 5_500);
        assert_eq!(trial.found, 5_000);
        assert_eq!(trial.mismatches, Some(0));
        assert_eq!(trial.violations, 0);
        assert!(trial.usage.is_some());
    }

    let lines = read_lines(&output);
    assert_eq!(lines.len(), 8);
    for line in &lines {
        let values: Vec<f64> = line.split(',').map(|v| v.parse().unwrap()).collect();
        // 1, 2, 4, ..., 512, then 1000 through 5000
        assert_eq!(values.len(), 15);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }

    // A second run appends.
    commands::run(&config, &OracleRegistry::with_defaults()).unwrap();
    assert_eq!(read_lines(&output).len(), 16);
}

#[test]
fn test_oracle_resolved_from_file_name() {
    let fixture = Fixture::new("rmi_synthetic_50K_uint64");
    let output = fixture.output("results.txt");
    let mut config = fixture.config(&output);
    config.oracle = None;
    config.timing = TimingMode::Correction;

    let outcome = commands::run(&config, &OracleRegistry::with_defaults()).unwrap();
    assert_eq!(outcome.trials.len(), 1);
    assert_eq!(outcome.trials[0].found, 5_000);
}

#[test]
fn test_unresolvable_oracle() {
    let fixture = Fixture::new("keys_uint64");
    let mut config = fixture.config(&fixture.output("results.txt"));
    config.oracle = None;

    let err = commands::run(&config, &OracleRegistry::with_defaults()).unwrap_err();
    assert!(matches!(err, BenchError::NoOracle { .. }));
}

#[test]
fn test_malformed_queries_abort_before_output() {
    let fixture = Fixture::new("keys_uint64");
    std::fs::write(&fixture.queries, "12\n-4\n").unwrap();
    let output = fixture.output("results.txt");

    let err = commands::run(&fixture.config(&output), &OracleRegistry::with_defaults()).unwrap_err();
    match err {
        BenchError::QueryParse { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn test_missing_artifact_is_fatal() {
    let fixture = Fixture::new("keys_uint64");
    let output = fixture.output("results.txt");
    let mut config = fixture.config(&output);
    config.artifact = None;

    let err = commands::run(&config, &OracleRegistry::with_defaults()).unwrap_err();
    assert!(matches!(err, BenchError::Oracle(_)));
    assert!(!output.exists());
}

#[test]
fn test_histogram_rows() {
    let fixture = Fixture::new("keys_uint64");
    let output = fixture.output("hist.csv");
    let mut config = fixture.config(&output);
    config.mode = OutputMode::Histogram;
    config.strategies = vec![Strategy::BoundedLinear];

    let outcome = commands::run(&config, &OracleRegistry::with_defaults()).unwrap();
    let histogram = outcome.trials[0].histogram.as_ref().unwrap();

    let mut rows = Vec::new();
    for line in read_lines(&output) {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], "linear");
        assert_eq!(fields[1], "1");
        rows.push((
            fields[2].parse::<u64>().unwrap(),
            fields[3].parse::<u64>().unwrap(),
        ));
    }

    assert_eq!(rows.iter().map(|(_, count)| count).sum::<u64>(), 5_500);
    assert!(rows.windows(2).all(|w| w[0].0 < w[1].0));
    assert_eq!(rows, histogram.buckets().collect::<Vec<_>>());
    // The slowest lookup is the last row, not folded into a low bucket.
    let (slowest, _) = *rows.last().unwrap();
    assert!(slowest > 0);
    assert!(slowest >= histogram.max());
}

#[test]
fn test_build_time_mode() {
    let fixture = Fixture::new("keys_uint64");
    let output = fixture.output("build.txt");
    let mut config = fixture.config(&output);
    config.mode = OutputMode::BuildTime;

    let outcome = commands::run(&config, &OracleRegistry::with_defaults()).unwrap();
    assert!(outcome.trials.is_empty());

    let lines = read_lines(&output);
    assert_eq!(lines.len(), 1);
    let fields: Vec<f64> = lines[0].split(',').map(|v| v.parse().unwrap()).collect();
    assert_eq!(fields.len(), 2);
}

#[test]
fn test_uint32_headerless_data() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("fb_uint32");
    let keys: Vec<u32> = (0..10_000u32).map(|i| i * 7).collect();
    write_key_file(&data, &keys, Layout::Headerless).unwrap();

    let queries = dir.path().join("queries.txt");
    std::fs::write(&queries, "0\n7\n8\n69993\n70000\n").unwrap();

    let output = dir.path().join("results.txt");
    let mut config = RunConfig::new(&data, &queries, &output);
    config.source.headerless_size = Some(keys.len());
    config.oracle = Some("binary".to_string());
    config.strategies = Strategy::ALL.to_vec();
    config.validate = true;

    let outcome = commands::run(&config, &OracleRegistry::with_defaults()).unwrap();
    assert_eq!(outcome.trials.len(), 3);
    for trial in &outcome.trials {
        assert_eq!(trial.found, 3);
        assert_eq!(trial.mismatches, Some(0));
    }
}
