//! Single linear model and the oracle built on it.

use crate::model::{LinearParams, OracleModel};
use crate::oracle::{PositionOracle, WHOLE_ARRAY, to_index};
use crate::{Estimate, OracleError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// `position = intercept + slope * key`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearModel {
    /// Position predicted for key zero
    pub intercept: f64,
    /// Positions per unit of key
    pub slope: f64,
}

impl LinearModel {
    /// Create a model from its coefficients.
    pub const fn new(intercept: f64, slope: f64) -> Self {
        Self { intercept, slope }
    }

    /// Least-squares fit of `(key, rank)` points, with ranks multiplied by
    /// `scale`.
    ///
    /// Mean and covariance are accumulated in one pass. No points gives the
    /// zero model; a single point or zero key variance gives a constant
    /// model at the smallest key's position.
    pub fn fit(points: &[(u64, usize)], scale: f64) -> Self {
        match points {
            [] => return Self::default(),
            [(_, rank)] => return Self::new(*rank as f64 * scale, 0.0),
            _ => {}
        }

        let mut n = 0.0;
        let mut mean_x = 0.0;
        let mut mean_y = 0.0;
        let mut co_moment = 0.0;
        let mut m2 = 0.0;

        for &(key, rank) in points {
            let x = key as f64;
            let y = rank as f64 * scale;
            n += 1.0;

            let dx = x - mean_x;
            mean_x += dx / n;
            mean_y += (y - mean_y) / n;
            co_moment += dx * (y - mean_y);
            m2 += dx * (x - mean_x);
        }

        if m2 <= 0.0 {
            let lowest = points
                .iter()
                .min_by_key(|(key, _)| *key)
                .map_or(0.0, |(_, rank)| *rank as f64 * scale);
            return Self::new(lowest, 0.0);
        }

        let slope = co_moment / m2;
        Self::new(slope.mul_add(-mean_x, mean_y), slope)
    }

    /// Raw model output for `key`.
    // A fused multiply-add is a libm call on targets without FMA.
    #[inline]
    #[allow(clippy::suboptimal_flops)]
    pub fn predict(&self, key: u64) -> f64 {
        self.intercept + self.slope * key as f64
    }

    /// Model output floored and clamped into `[0, limit]`.
    #[inline]
    pub fn predict_index(&self, key: u64, limit: usize) -> usize {
        to_index(self.predict(key), limit)
    }
}

/// Oracle backed by one [`LinearModel`] and one global error bound.
#[derive(Debug, Default)]
pub struct LinearOracle {
    params: Option<LinearParams>,
}

impl LinearOracle {
    /// Registry id.
    pub const ID: &'static str = "linear";

    /// Create an unloaded oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an oracle already holding `params`.
    pub fn from_params(params: LinearParams) -> Self {
        Self {
            params: Some(params),
        }
    }

    /// Loaded parameters, if any.
    pub fn params(&self) -> Option<&LinearParams> {
        self.params.as_ref()
    }
}

impl PositionOracle for LinearOracle {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn load(&mut self, artifact: Option<&Path>) -> Result<()> {
        let path = artifact.ok_or(OracleError::MissingArtifact { oracle: Self::ID })?;
        match OracleModel::load(path)? {
            OracleModel::Linear(params) => {
                debug!(
                    "Loaded linear model over {} keys (error bound {})",
                    params.num_keys, params.error_bound
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
        match &self.params {
            Some(p) => Estimate::new(p.model.predict_index(key, p.num_keys), p.error_bound),
            None => WHOLE_ARRAY,
        }
    }

    fn unload(&mut self) {
        self.params = None;
    }

    fn is_loaded(&self) -> bool {
        self.params.is_some()
    }
}
