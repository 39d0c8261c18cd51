//! Benchmark runner.
//!
//! The runner owns the query sequence, the key store, the oracle and the
//! per-pass result buffers. Nothing inside a timed pass allocates, logs or
//! touches the file system: results go into preallocated buffers and are
//! checked after the clock stops.

use crate::config::{DataSource, OutputMode, TimingMode};
use crate::histogram::LatencyHistogram;
use crate::perf::ResourceUsage;
use crate::report::ReportWriter;
use crate::schedule::CheckpointSchedule;
use crate::{BenchError, Result};
use rankprobe_oracle::PositionOracle;
use rankprobe_search::{CorrectionWindow, Estimate, RankResult, Strategy};
use rankprobe_store::{Key, KeyStore};
use std::hint::black_box;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    /// Queries parsed, nothing loaded
    Init,
    /// Store and oracle loaded
    Loaded,
    /// Timed passes in progress
    Running,
    /// Passes finished, results not yet written
    Reporting,
    /// Resources released
    Done,
}

/// What a run measures.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Passes per strategy and scale
    pub repeats: usize,
    /// Strategies, in the order they run
    pub strategies: Vec<Strategy>,
    /// Error-bound multipliers, in the order they run
    pub scales: Vec<f64>,
    /// What the timed region covers
    pub timing: TimingMode,
    /// What gets reported
    pub mode: OutputMode,
    /// When checkpoints are taken
    pub schedule: CheckpointSchedule,
    /// Sample the oracle's error every this many queries (0 disables)
    pub diagnostic_interval: usize,
    /// Compare every result with a full binary search
    pub validate: bool,
    /// Sample resource counters around each pass
    pub perf: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            repeats: 1,
            strategies: vec![Strategy::BoundedBinary],
            scales: vec![1.0],
            timing: TimingMode::Combined,
            mode: OutputMode::Checkpoints,
            schedule: CheckpointSchedule::default(),
            diagnostic_interval: 10_000,
            validate: false,
            perf: false,
        }
    }
}

/// Cumulative elapsed time after a number of queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Queries completed
    pub queries: usize,
    /// Nanoseconds since the pass started
    pub elapsed_ns: u64,
}

impl Checkpoint {
    /// Elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ns as f64 / 1_000_000.0
    }
}

/// The oracle's error on one sampled query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorSample {
    /// Position in the query sequence
    pub query_index: usize,
    /// Queried key
    pub key: u64,
    /// Estimate after scaling
    pub estimate: Estimate,
    /// Rank from a full binary search
    pub true_rank: usize,
    /// `|approx - true_rank|`
    pub error: usize,
    /// Whether the true rank was inside the window
    pub within_bound: bool,
}

/// Measurements from one pass over the queries.
#[derive(Debug, Clone)]
pub struct TrialReport {
    /// Correction strategy
    pub strategy: Strategy,
    /// Error-bound multiplier
    pub scale: f64,
    /// 0-based repeat number
    pub repeat: usize,
    /// Queries resolved
    pub queries: usize,
    /// Duration of the timed region
    pub total_ns: u64,
    /// Cumulative times (checkpoint mode)
    pub checkpoints: Vec<Checkpoint>,
    /// Per-query latencies (histogram mode)
    pub histogram: Option<LatencyHistogram>,
    /// Queries that resolved to `Found`
    pub found: usize,
    /// Sampled oracle errors
    pub samples: Vec<ErrorSample>,
    /// Samples whose true rank fell outside the window
    pub violations: usize,
    /// Results that disagreed with a full binary search, when validating
    pub mismatches: Option<usize>,
    /// Resource counters accumulated over the timed region
    pub usage: Option<ResourceUsage>,
}

impl TrialReport {
    /// Mean nanoseconds per query.
    pub fn mean_ns(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.queries as f64
        }
    }
}

/// Load times measured in build-time mode (and always logged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildTimes {
    /// Opening and mapping the data file
    pub store_ns: u64,
    /// Loading the oracle
    pub oracle_ns: u64,
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Load times
    pub build: BuildTimes,
    /// One report per strategy, scale and repeat
    pub trials: Vec<TrialReport>,
}

/// Drives a run through its phases.
pub struct BenchmarkRunner<K: Key> {
    settings: RunSettings,
    phase: RunPhase,
    queries: Vec<K>,
    store: Option<KeyStore<K>>,
    oracle: Option<Box<dyn PositionOracle>>,
    build: BuildTimes,
    trials: Vec<TrialReport>,
}

impl<K: Key> BenchmarkRunner<K> {
    /// Create a runner for `queries`, which are replayed in order.
    pub fn new(settings: RunSettings, queries: Vec<K>) -> Self {
        debug!("Runner created with {} queries", queries.len());
        Self {
            settings,
            phase: RunPhase::Init,
            queries,
            store: None,
            oracle: None,
            build: BuildTimes::default(),
            trials: Vec::new(),
        }
    }

    /// Current phase.
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Query sequence.
    pub fn queries(&self) -> &[K] {
        &self.queries
    }

    /// Settings the runner was created with.
    pub const fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Open the data file and load `oracle` from `artifact`, timing both.
    pub fn load(
        &mut self,
        source: &DataSource,
        mut oracle: Box<dyn PositionOracle>,
        artifact: Option<&Path>,
    ) -> Result<BuildTimes> {
        self.expect(RunPhase::Init)?;

        let start = Instant::now();
        let store = source.open::<K>()?;
        let store_ns = nanos(start.elapsed());

        let start = Instant::now();
        oracle.load(artifact)?;
        let oracle_ns = nanos(start.elapsed());

        let build = BuildTimes {
            store_ns,
            oracle_ns,
        };
        info!(
            "Loaded {} keys in {:.3} ms and oracle '{}' in {:.3} ms",
            store.size(),
            store_ns as f64 / 1e6,
            oracle.name(),
            oracle_ns as f64 / 1e6
        );

        self.install(store, oracle, build);
        Ok(build)
    }

    /// Use an already open store and an already loaded oracle.
    pub fn attach(&mut self, store: KeyStore<K>, oracle: Box<dyn PositionOracle>) -> Result<()> {
        self.expect(RunPhase::Init)?;
        self.install(store, oracle, BuildTimes::default());
        Ok(())
    }

    fn install(&mut self, store: KeyStore<K>, oracle: Box<dyn PositionOracle>, build: BuildTimes) {
        if !oracle.is_loaded() {
            warn!(
                "Oracle '{}' is not loaded; every lookup will search the whole array",
                oracle.name()
            );
        }
        self.store = Some(store);
        self.oracle = Some(oracle);
        self.build = build;
        self.enter(RunPhase::Loaded);
    }

    /// Run every configured pass.
    ///
    /// In build-time mode no passes run. Strategies that ignore the estimate
    /// run at the first scale only.
    pub fn execute(&mut self) -> Result<&[TrialReport]> {
        self.expect(RunPhase::Loaded)?;
        self.enter(RunPhase::Running);

        let (Some(store), Some(oracle)) = (self.store.as_ref(), self.oracle.as_deref()) else {
            return Err(BenchError::Phase {
                expected: RunPhase::Loaded,
                actual: self.phase,
            });
        };

        let mut trials = Vec::new();
        if self.settings.mode != OutputMode::BuildTime {
            let pass = Pass {
                store,
                oracle,
                queries: &self.queries,
                settings: &self.settings,
            };
            let mut sink = Sink::new(self.queries.len());

            for &strategy in &self.settings.strategies {
                for (scale_index, &scale) in self.settings.scales.iter().enumerate() {
                    if scale_index > 0 && !strategy.uses_estimate() {
                        debug!("Skipping scale {} for {}: estimate unused", scale, strategy);
                        continue;
                    }
                    for repeat in 0..self.settings.repeats {
                        let trial = pass.run(strategy, scale, repeat, &mut sink)?;
                        log_trial(&trial);
                        trials.push(trial);
                    }
                }
            }
        }

        self.trials = trials;
        self.enter(RunPhase::Reporting);
        Ok(&self.trials)
    }

    /// Append results to `output` and hand them back.
    pub fn report(&mut self, output: &Path) -> Result<RunOutcome> {
        self.expect(RunPhase::Reporting)?;

        let outcome = RunOutcome {
            build: self.build,
            trials: std::mem::take(&mut self.trials),
        };

        let mut writer = ReportWriter::append(output)?;
        writer.write_outcome(self.settings.mode, &outcome)?;
        writer.finish()?;

        info!(
            "Appended {} result(s) to {}",
            outcome.trials.len().max(1),
            output.display()
        );
        Ok(outcome)
    }

    /// Release the store and the oracle. Safe to call more than once.
    pub fn finish(&mut self) {
        if let Some(mut store) = self.store.take() {
            store.close();
        }
        if let Some(mut oracle) = self.oracle.take() {
            oracle.unload();
        }
        if self.phase != RunPhase::Done {
            self.enter(RunPhase::Done);
        }
    }

    fn expect(&self, expected: RunPhase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(BenchError::Phase {
                expected,
                actual: self.phase,
            })
        }
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!("Run phase {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}

impl<K: Key> std::fmt::Debug for BenchmarkRunner<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BenchmarkRunner")
            .field("phase", &self.phase)
            .field("queries", &self.queries.len())
            .field("store", &self.store)
            .field("oracle", &self.oracle.as_ref().map(|o| o.name()))
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Per-query buffers reused across passes.
struct Sink {
    results: Vec<RankResult>,
    estimates: Vec<Estimate>,
}

impl Sink {
    fn new(len: usize) -> Self {
        Self {
            results: vec![RankResult::NotFound; len],
            estimates: vec![Estimate::default(); len],
        }
    }
}

/// Borrowed inputs shared by every pass.
struct Pass<'a, K: Key> {
    store: &'a KeyStore<K>,
    oracle: &'a dyn PositionOracle,
    queries: &'a [K],
    settings: &'a RunSettings,
}

impl<K: Key> Pass<'_, K> {
    fn run(&self, strategy: Strategy, scale: f64, repeat: usize, sink: &mut Sink) -> Result<TrialReport> {
        let n = self.queries.len();
        let mut histogram = match self.settings.mode {
            OutputMode::Histogram => Some(LatencyHistogram::new()?),
            _ => None,
        };
        let mut checkpoints = Vec::with_capacity(self.settings.schedule.count(n));

        let before = self.settings.perf.then(ResourceUsage::snapshot);
        let total_ns = self.timed(strategy, scale, sink, &mut checkpoints, histogram.as_mut());
        let usage = before.map(|b| ResourceUsage::snapshot().since(&b));
        black_box(&sink.results);

        if self.settings.timing == TimingMode::Oracle {
            for (i, &key) in self.queries.iter().enumerate() {
                sink.results[i] = strategy.search(self.store, key, sink.estimates[i].scaled(scale));
            }
        }

        let found = sink.results.iter().filter(|r| r.is_found()).count();
        let (samples, violations) = self.sample_errors(strategy, scale);
        let mismatches = self.settings.validate.then(|| self.mismatches(&sink.results));

        Ok(TrialReport {
            strategy,
            scale,
            repeat,
            queries: n,
            total_ns,
            checkpoints,
            histogram,
            found,
            samples,
            violations,
            mismatches,
            usage,
        })
    }

    /// The timed region. Returns its duration in nanoseconds.
    fn timed(
        &self,
        strategy: Strategy,
        scale: f64,
        sink: &mut Sink,
        checkpoints: &mut Vec<Checkpoint>,
        histogram: Option<&mut LatencyHistogram>,
    ) -> u64 {
        let store = self.store;
        let oracle = self.oracle;
        let queries = self.queries;
        let schedule = self.settings.schedule;
        let Sink { results, estimates } = sink;

        match self.settings.timing {
            TimingMode::Combined if strategy.uses_estimate() => {
                drive(queries.len(), schedule, checkpoints, histogram, |i| {
                    let key = queries[i];
                    let estimate = oracle.lookup(key.to_u64()).scaled(scale);
                    results[i] = strategy.search(store, key, estimate);
                })
            }
            TimingMode::Combined => drive(queries.len(), schedule, checkpoints, histogram, |i| {
                results[i] = strategy.search(store, queries[i], Estimate::default());
            }),
            TimingMode::Oracle => drive(queries.len(), schedule, checkpoints, histogram, |i| {
                estimates[i] = oracle.lookup(queries[i].to_u64());
            }),
            TimingMode::Correction => {
                for (estimate, key) in estimates.iter_mut().zip(queries) {
                    *estimate = oracle.lookup(key.to_u64()).scaled(scale);
                }
                drive(queries.len(), schedule, checkpoints, histogram, |i| {
                    results[i] = strategy.search(store, queries[i], estimates[i]);
                })
            }
        }
    }

    /// Sample the oracle's error every `diagnostic_interval` queries.
    fn sample_errors(&self, strategy: Strategy, scale: f64) -> (Vec<ErrorSample>, usize) {
        let interval = self.settings.diagnostic_interval;
        if interval == 0 || !strategy.uses_estimate() {
            return (Vec::new(), 0);
        }

        let mut samples = Vec::new();
        let mut violations = 0;
        for (query_index, &key) in self.queries.iter().enumerate().step_by(interval) {
            let RankResult::Found(true_rank) = self.store.rank(key) else {
                continue;
            };
            let estimate = self.oracle.lookup(key.to_u64()).scaled(scale);
            let within_bound =
                CorrectionWindow::from_estimate(estimate, self.store.size()).contains(true_rank);

            if !within_bound {
                violations += 1;
                warn!(
                    "Oracle '{}' missed key {} at query {}: estimate {} +/- {}, true rank {}",
                    self.oracle.name(),
                    key,
                    query_index,
                    estimate.approx,
                    estimate.error_bound,
                    true_rank
                );
            }

            samples.push(ErrorSample {
                query_index,
                key: key.to_u64(),
                estimate,
                true_rank,
                error: estimate.error_against(true_rank),
                within_bound,
            });
        }
        (samples, violations)
    }

    fn mismatches(&self, results: &[RankResult]) -> usize {
        let mut mismatches = 0;
        for (i, (&key, &result)) in self.queries.iter().zip(results).enumerate() {
            let expected = self.store.rank(key);
            if result != expected {
                if mismatches == 0 {
                    warn!(
                        "Query {} (key {}) returned {:?}, expected {:?}",
                        i, key, result, expected
                    );
                }
                mismatches += 1;
            }
        }
        mismatches
    }
}

/// Call `step` for every query index, recording checkpoints or per-query
/// latencies.
#[inline]
fn drive(
    n: usize,
    schedule: CheckpointSchedule,
    checkpoints: &mut Vec<Checkpoint>,
    histogram: Option<&mut LatencyHistogram>,
    mut step: impl FnMut(usize),
) -> u64 {
    let start = Instant::now();
    match histogram {
        Some(histogram) => {
            for i in 0..n {
                let t = Instant::now();
                step(i);
                histogram.record(nanos(t.elapsed()));
            }
        }
        None => {
            for i in 0..n {
                step(i);
                if schedule.is_checkpoint(i) {
                    checkpoints.push(Checkpoint {
                        queries: i + 1,
                        elapsed_ns: nanos(start.elapsed()),
                    });
                }
            }
        }
    }
    nanos(start.elapsed())
}

fn nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

fn log_trial(trial: &TrialReport) {
    info!(
        "{} x{} repeat {}: {} queries in {:.3} ms ({:.1} ns/lookup), {} found, {} violation(s)",
        trial.strategy,
        trial.scale,
        trial.repeat,
        trial.queries,
        trial.total_ns as f64 / 1e6,
        trial.mean_ns(),
        trial.found,
        trial.violations
    );
    if let Some(histogram) = &trial.histogram {
        info!("{} x{} latency: {}", trial.strategy, trial.scale, histogram.summary());
    }
    if let Some(usage) = &trial.usage {
        info!("{} x{} usage: {}", trial.strategy, trial.scale, usage);
    }
    if let Some(mismatches) = trial.mismatches {
        if mismatches > 0 {
            warn!(
                "{} x{}: {} result(s) disagree with a full binary search",
                trial.strategy, trial.scale, mismatches
            );
        } else {
            debug!("{} x{}: all results validated", trial.strategy, trial.scale);
        }
    }
}
