//! Position oracles.
//!
//! A [`PositionOracle`] maps a key to an [`Estimate`]: an approximate rank
//! and a maximum error. The benchmark harness treats oracles as opaque and
//! picks them at runtime through an [`OracleRegistry`].
//!
//! Three reference oracles ship with the crate:
//!
//! | Id | Oracle | Artifact |
//! |----|--------|----------|
//! | `binary` | [`BinarySearchOracle`] | none, the window is the whole array |
//! | `linear` | [`LinearOracle`] | [`OracleModel::Linear`] |
//! | `rmi` | [`RmiOracle`] | [`OracleModel::Rmi`] |
//!
//! Artifacts are JSON documents produced by [`OracleModel::fit_linear`] or
//! [`OracleModel::fit_rmi`] and written with [`OracleModel::save`].
//!
//! # Example
//!
//! ```
//! use rankprobe_oracle::{OracleModel, PositionOracle};
//!
//! let keys: Vec<u64> = (0..1000).map(|i| i * 10).collect();
//! let model = OracleModel::fit_rmi(&keys, 16).unwrap();
//! let oracle = model.into_oracle();
//!
//! let estimate = oracle.lookup(5000);
//! assert!(estimate.approx.abs_diff(500) < estimate.error_bound);
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod binary;
mod linear;
mod model;
mod oracle;
mod registry;
mod rmi;

pub use binary::BinarySearchOracle;
pub use linear::{LinearModel, LinearOracle};
pub use model::{ErrorSummary, LinearParams, OracleModel, RmiParams, training_points};
pub use oracle::PositionOracle;
pub use rankprobe_search::Estimate;
pub use registry::{OracleFactory, OracleRegistry};
pub use rmi::RmiOracle;

use std::path::PathBuf;
use thiserror::Error;

/// Result type for oracle operations
pub type Result<T> = std::result::Result<T, OracleError>;

/// Errors raised while loading, fitting or selecting oracles
#[derive(Debug, Error)]
pub enum OracleError {
    /// Artifact could not be read or written
    #[error("Artifact I/O failed for {path}: {source}")]
    Io {
        /// Artifact path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Artifact is not valid JSON for any known model
    #[error("Invalid artifact {path}: {source}")]
    Artifact {
        /// Artifact path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Artifact parsed but describes an unusable model
    #[error("Invalid model in {path}: {reason}")]
    InvalidModel {
        /// Artifact path
        path: PathBuf,
        /// What is inconsistent
        reason: String,
    },

    /// Artifact holds a different kind of model than the oracle expects
    #[error("Oracle '{oracle}' cannot load a '{found}' artifact")]
    KindMismatch {
        /// Oracle being loaded
        oracle: &'static str,
        /// Kind found in the artifact
        found: &'static str,
    },

    /// Oracle needs an artifact but none was given
    #[error("Oracle '{oracle}' requires an artifact path")]
    MissingArtifact {
        /// Oracle being loaded
        oracle: &'static str,
    },

    /// No oracle registered under this id
    #[error("Unknown oracle '{id}'")]
    UnknownOracle {
        /// Requested id
        id: String,
    },

    /// Model could not be fitted
    #[error("Cannot fit model: {reason}")]
    Fit {
        /// What was wrong with the input
        reason: String,
    },
}
