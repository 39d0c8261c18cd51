//! Baseline oracle that predicts nothing.

use crate::oracle::{PositionOracle, WHOLE_ARRAY};
use crate::{Estimate, Result};
use std::path::Path;

/// Returns the whole array as the window for every key, so bounded
/// searches degenerate into a plain binary search.
#[derive(Debug, Default)]
pub struct BinarySearchOracle {
    loaded: bool,
}

impl BinarySearchOracle {
    /// Registry id.
    pub const ID: &'static str = "binary";

    /// Create an unloaded oracle.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionOracle for BinarySearchOracle {
    fn name(&self) -> &'static str {
        Self::ID
    }

    fn load(&mut self, _artifact: Option<&Path>) -> Result<()> {
        self.loaded = true;
        Ok(())
    }

    #[inline]
    fn lookup(&self, _key: u64) -> Estimate {
        WHOLE_ARRAY
    }

    fn unload(&mut self) {
        self.loaded = false;
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}
