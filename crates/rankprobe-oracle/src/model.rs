//! Model artifacts and fitting.

use crate::linear::{LinearModel, LinearOracle};
use crate::oracle::{PositionOracle, WHOLE_ARRAY};
use crate::rmi::RmiOracle;
use crate::{Estimate, OracleError, Result};
use rankprobe_search::CorrectionWindow;
use rankprobe_store::Key;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Parameters of a single linear model with a global bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearParams {
    /// Number of keys the model was fitted on
    pub num_keys: usize,
    /// The model
    pub model: LinearModel,
    /// Bound on `|approx - rank|`, plus one
    pub error_bound: usize,
}

impl LinearParams {
    /// Estimate for `key`.
    #[inline]
    pub fn estimate(&self, key: u64) -> Estimate {
        Estimate::new(self.model.predict_index(key, self.num_keys), self.error_bound)
    }
}

/// Parameters of a two-layer RMI with one bound per leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmiParams {
    /// Number of keys the model was fitted on
    pub num_keys: usize,
    /// Routes a key to a leaf
    pub root: LinearModel,
    /// Leaf models predicting ranks
    pub leaves: Vec<LinearModel>,
    /// Per-leaf bound on `|approx - rank|`, plus one
    pub leaf_errors: Vec<usize>,
}

impl RmiParams {
    /// Leaf responsible for `key`.
    #[inline]
    pub fn leaf_for(&self, key: u64) -> usize {
        self.root
            .predict_index(key, self.leaves.len().saturating_sub(1))
    }

    /// Estimate for `key`.
    ///
    /// Params with a missing leaf model or bound give the whole-array
    /// estimate for keys routed there.
    #[inline]
    pub fn estimate(&self, key: u64) -> Estimate {
        let leaf = self.leaf_for(key);
        match (self.leaves.get(leaf), self.leaf_errors.get(leaf)) {
            (Some(model), Some(&error_bound)) => {
                Estimate::new(model.predict_index(key, self.num_keys), error_bound)
            }
            _ => WHOLE_ARRAY,
        }
    }

    /// Number of leaf models.
    pub fn branching(&self) -> usize {
        self.leaves.len()
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.leaves.is_empty() {
            return Err("RMI has no leaf models".to_string());
        }
        if self.leaves.len() != self.leaf_errors.len() {
            return Err(format!(
                "{} leaf models but {} leaf errors",
                self.leaves.len(),
                self.leaf_errors.len()
            ));
        }
        Ok(())
    }
}

/// A fitted model as stored in an artifact file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OracleModel {
    /// One linear model
    Linear(LinearParams),
    /// Two-layer linear RMI
    Rmi(RmiParams),
}

/// How well a model predicts the keys it is evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ErrorSummary {
    /// Distinct keys evaluated
    pub keys: usize,
    /// Mean `|approx - rank|`
    pub mean_error: f64,
    /// Largest `|approx - rank|`
    pub max_error: usize,
    /// Keys whose rank falls outside the estimate's window
    pub violations: usize,
}

/// Distinct keys paired with the rank of their first occurrence.
pub fn training_points<K: Key>(keys: &[K]) -> Vec<(u64, usize)> {
    let mut points = Vec::with_capacity(keys.len());
    for (rank, key) in keys.iter().enumerate() {
        if rank == 0 || keys[rank - 1] != *key {
            points.push((key.to_u64(), rank));
        }
    }
    points
}

fn max_error<'a>(
    points: impl IntoIterator<Item = &'a (u64, usize)>,
    predict: impl Fn(u64) -> usize,
) -> usize {
    points
        .into_iter()
        .map(|&(key, rank)| predict(key).abs_diff(rank))
        .max()
        .unwrap_or(0)
}

impl OracleModel {
    /// Fit a single linear model to sorted `keys`.
    pub fn fit_linear<K: Key>(keys: &[K]) -> Result<Self> {
        if keys.is_empty() {
            return Err(OracleError::Fit {
                reason: "no keys to fit".to_string(),
            });
        }

        let points = training_points(keys);
        let num_keys = keys.len();
        let model = LinearModel::fit(&points, 1.0);
        let max = max_error(&points, |key| model.predict_index(key, num_keys));

        debug!(
            "Fitted linear model: intercept {}, slope {}, max error {}",
            model.intercept, model.slope, max
        );

        Ok(Self::Linear(LinearParams {
            num_keys,
            model,
            error_bound: max.saturating_add(1),
        }))
    }

    /// Fit a two-layer linear RMI with `branching` leaves to sorted `keys`.
    ///
    /// The root is trained on ranks scaled into `[0, branching)`; each leaf
    /// is trained on the keys the root sends to it and records its own bound.
    pub fn fit_rmi<K: Key>(keys: &[K], branching: usize) -> Result<Self> {
        if keys.is_empty() {
            return Err(OracleError::Fit {
                reason: "no keys to fit".to_string(),
            });
        }
        if branching == 0 {
            return Err(OracleError::Fit {
                reason: "branching factor must be at least 1".to_string(),
            });
        }

        let points = training_points(keys);
        let num_keys = keys.len();

        info!("Training root layer over {} distinct keys", points.len());
        let root = LinearModel::fit(&points, branching as f64 / num_keys as f64);

        let mut buckets: Vec<Vec<(u64, usize)>> = vec![Vec::new(); branching];
        for &point in &points {
            buckets[root.predict_index(point.0, branching - 1)].push(point);
        }

        info!("Training {} leaf models", branching);
        let leaves: Vec<LinearModel> = buckets
            .iter()
            .map(|bucket| LinearModel::fit(bucket, 1.0))
            .collect();

        let leaf_errors: Vec<usize> = buckets
            .iter()
            .zip(&leaves)
            .map(|(bucket, leaf)| {
                max_error(bucket, |key| leaf.predict_index(key, num_keys)).saturating_add(1)
            })
            .collect();

        let empty = buckets.iter().filter(|b| b.is_empty()).count();
        debug!(
            "RMI leaves: {} empty, largest bound {}",
            empty,
            leaf_errors.iter().max().copied().unwrap_or(0)
        );

        Ok(Self::Rmi(RmiParams {
            num_keys,
            root,
            leaves,
            leaf_errors,
        }))
    }

    /// Kind tag as written in the artifact.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Linear(_) => "linear",
            Self::Rmi(_) => "rmi",
        }
    }

    /// Number of keys the model was fitted on.
    pub const fn num_keys(&self) -> usize {
        match self {
            Self::Linear(p) => p.num_keys,
            Self::Rmi(p) => p.num_keys,
        }
    }

    /// Estimate for `key`.
    #[inline]
    pub fn estimate(&self, key: u64) -> Estimate {
        match self {
            Self::Linear(p) => p.estimate(key),
            Self::Rmi(p) => p.estimate(key),
        }
    }

    /// Measure prediction error over sorted `keys`.
    pub fn evaluate<K: Key>(&self, keys: &[K]) -> ErrorSummary {
        let points = training_points(keys);
        let mut total = 0u128;
        let mut summary = ErrorSummary {
            keys: points.len(),
            ..ErrorSummary::default()
        };

        for &(key, rank) in &points {
            let estimate = self.estimate(key);
            let error = estimate.error_against(rank);
            total += error as u128;
            summary.max_error = summary.max_error.max(error);
            if !CorrectionWindow::from_estimate(estimate, keys.len()).contains(rank) {
                summary.violations += 1;
            }
        }

        if !points.is_empty() {
            summary.mean_error = total as f64 / points.len() as f64;
        }
        summary
    }

    /// Wrap the model in its oracle.
    pub fn into_oracle(self) -> Box<dyn PositionOracle> {
        match self {
            Self::Linear(p) => Box::new(LinearOracle::from_params(p)),
            Self::Rmi(p) => Box::new(RmiOracle::from_params(p)),
        }
    }

    /// Write the model to `path` as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_err = |source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::create(path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| {
            OracleError::Artifact {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writer.flush().map_err(io_err)?;

        debug!("Wrote {} model to {}", self.kind(), path.display());
        Ok(())
    }

    /// Read a model from a JSON artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let model: Self = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
            OracleError::Artifact {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if let Self::Rmi(params) = &model {
            params.check().map_err(|reason| OracleError::InvalidModel {
                path: path.to_path_buf(),
                reason,
            })?;
        }

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_training_points_first_occurrence() {
        let points = training_points(&[2u64, 4, 4, 7, 9]);
        assert_eq!(points, vec![(2, 0), (4, 1), (7, 3), (9, 4)]);
    }

    #[test]
    fn test_linear_fit_bounds_every_key() {
        let keys: Vec<u64> = (0..5_000u64).map(|i| i * i / 7).collect();
        let model = OracleModel::fit_linear(&keys).unwrap();
        let summary = model.evaluate(&keys);
        assert_eq!(summary.violations, 0);
        assert!(summary.max_error > 0);
    }

    #[test]
    fn test_rmi_beats_linear_on_curved_data() {
        let keys: Vec<u64> = (0..20_000u64).map(|i| i * i).collect();
        let linear = OracleModel::fit_linear(&keys).unwrap().evaluate(&keys);
        let rmi = OracleModel::fit_rmi(&keys, 256).unwrap().evaluate(&keys);

        assert_eq!(rmi.violations, 0);
        assert!(rmi.max_error < linear.max_error);
    }

    #[test]
    fn test_rmi_single_leaf() {
        let keys = [1u32, 5, 5, 5, 9];
        let model = OracleModel::fit_rmi(&keys, 1).unwrap();
        assert_eq!(model.evaluate(&keys).violations, 0);
        assert_eq!(model.num_keys(), 5);
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        assert!(matches!(
            OracleModel::fit_linear::<u64>(&[]),
            Err(OracleError::Fit { .. })
        ));
        assert!(matches!(
            OracleModel::fit_rmi(&[1u64, 2], 0),
            Err(OracleError::Fit { .. })
        ));
    }

    #[test]
    fn test_artifact_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let keys: Vec<u64> = (0..1_000).map(|i| i * 3).collect();
        let model = OracleModel::fit_rmi(&keys, 8).unwrap();

        model.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"kind\": \"rmi\""));
        assert_eq!(OracleModel::load(&path).unwrap(), model);
    }

    #[test]
    fn test_load_rejects_inconsistent_rmi() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"kind":"rmi","num_keys":3,"root":{"intercept":0.0,"slope":0.0},"leaves":[],"leaf_errors":[]}"#,
        )
        .unwrap();

        assert!(matches!(
            OracleModel::load(&path),
            Err(OracleError::InvalidModel { .. })
        ));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"kind\":\"pgm\"}").unwrap();

        assert!(matches!(
            OracleModel::load(&path),
            Err(OracleError::Artifact { .. })
        ));
    }
}
