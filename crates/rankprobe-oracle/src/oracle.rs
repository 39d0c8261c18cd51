//! The oracle contract.

use crate::{Estimate, Result};
use std::path::Path;

/// Predicts the rank of a key together with a maximum error.
///
/// The harness trusts the stated bound: an oracle that under-reports its
/// error produces misses, which are measured rather than rejected.
///
/// An oracle that is not loaded answers with the whole-array estimate
/// `(0, usize::MAX)`, so lookups stay correct if slower.
pub trait PositionOracle: Send {
    /// Registry id of this oracle.
    fn name(&self) -> &'static str;

    /// Load the oracle's model, replacing any loaded one.
    ///
    /// `artifact` is ignored by oracles that need no model file.
    fn load(&mut self, artifact: Option<&Path>) -> Result<()>;

    /// Predict the rank of `key`.
    fn lookup(&self, key: u64) -> Estimate;

    /// Release the loaded model. Unloading twice is a no-op.
    fn unload(&mut self);

    /// Whether a model is loaded.
    fn is_loaded(&self) -> bool;
}

/// Estimate covering every index.
pub(crate) const WHOLE_ARRAY: Estimate = Estimate::new(0, usize::MAX);

/// Convert a model output to an index the way a floor-and-clamp-at-zero
/// integer prediction does, then clamp it to `limit`.
#[inline]
pub(crate) fn to_index(value: f64, limit: usize) -> usize {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    // `as` saturates at usize::MAX.
    (value.floor() as usize).min(limit)
}
