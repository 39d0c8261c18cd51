//! Two-layer RMI oracle.

use crate::model::{OracleModel, RmiParams};
use crate::oracle::{PositionOracle, WHOLE_ARRAY};
use crate::{Estimate, OracleError, Result};
use std::path::Path;
use tracing::debug;

/// Oracle backed by a two-layer linear RMI with per-leaf error bounds.
#[derive(Debug, Default)]
pub struct RmiOracle {
    params: Option<RmiParams>,
}

impl RmiOracle {
    /// Registry id.
    pub const ID: &'static str = "rmi";

    /// Create an unloaded oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an oracle already holding `params`.
    pub fn from_params(params: RmiParams) -> Self {
        Self {
            params: Some(params),
        }
    }

    /// Loaded parameters, if any.
    pub fn params(&self) -> Option<&RmiParams> {
        self.params.as_ref()
    }
}

impl PositionOracle for RmiOracle {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn load(&mut self, artifact: Option<&Path>) -> Result<()> {
        let path = artifact.ok_or(OracleError::MissingArtifact { oracle: Self::ID })?;
        match OracleModel::load(path)? {
            OracleModel::Rmi(params) => {
                debug!(
                    "Loaded RMI over {} keys with {} leaves",
                    params.num_keys,
                    params.branching()
                );
                self.params = Some(params);
                Ok(())
            }
            other => Err(OracleError::KindMismatch {
                oracle: Self::ID,
                found: other.kind(),
            }),
        }
    }

    #[inline]
    fn lookup(&self, key: u64) -> Estimate {
        self.params.as_ref().map_or(WHOLE_ARRAY, |p| p.estimate(key))
    }

    fn unload(&mut self) {
        self.params = None;
    }

    fn is_loaded(&self) -> bool {
        self.params.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::LinearModel;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rmi.json");
        let keys: Vec<u64> = (1..=4_096).map(|i| i * 16 + i % 5).collect();
        OracleModel::fit_rmi(&keys, 32).unwrap().save(&path).unwrap();

        let mut oracle = RmiOracle::new();
        oracle.load(Some(&path)).unwrap();
        assert!(oracle.is_loaded());
        assert_eq!(oracle.params().unwrap().branching(), 32);

        for (rank, key) in keys.iter().enumerate().step_by(97) {
            let estimate = oracle.lookup(*key);
            assert!(estimate.error_against(rank) < estimate.error_bound);
        }

        oracle.unload();
        assert_eq!(oracle.lookup(keys[0]), WHOLE_ARRAY);
    }

    #[test]
    fn test_malformed_params_fall_back_to_whole_array() {
        let root = LinearModel {
            intercept: 0.0,
            slope: 1.0,
        };
        let no_leaves = RmiOracle::from_params(RmiParams {
            num_keys: 10,
            root,
            leaves: vec![],
            leaf_errors: vec![],
        });
        assert_eq!(no_leaves.lookup(5), WHOLE_ARRAY);

        let missing_bounds = RmiOracle::from_params(RmiParams {
            num_keys: 10,
            root,
            leaves: vec![root, root],
            leaf_errors: vec![3],
        });
        assert_eq!(missing_bounds.lookup(0), Estimate::new(0, 3));
        assert_eq!(missing_bounds.lookup(1_000), WHOLE_ARRAY);
    }

    #[test]
    fn test_load_wrong_kind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("linear.json");
        OracleModel::fit_linear(&[1u64, 2, 3]).unwrap().save(&path).unwrap();

        let err = RmiOracle::new().load(Some(&path)).unwrap_err();
        assert!(matches!(
            err,
            OracleError::KindMismatch {
                oracle: "rmi",
                found: "linear"
            }
        ));
    }
}
