//! Read-only sorted key arrays for rank queries.
//!
//! A [`KeyStore`] holds an immutable, non-decreasing sequence of fixed-width
//! integer keys, either owned in memory or mapped read-only from a data file.
//! It answers two questions:
//!
//! - [`KeyStore::rank`]: where does the first occurrence of a key live?
//! - [`KeyStore::rank_within`]: the same, restricted to an index window.
//!
//! The windowed query is the primitive that correction searches funnel
//! through after a predictive model has narrowed the range.
//!
//! # Data File Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! [count: u64][key_0 .. key_{count-1}]     counted layout
//! [key_0 .. key_{n-1}]                     headerless layout (n supplied by caller)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use rankprobe_store::{KeyStore, RankResult};
//!
//! # fn example() -> rankprobe_store::Result<()> {
//! let store = KeyStore::<u64>::open("books_200M_uint64")?;
//! match store.rank(42) {
//!     RankResult::Found(i) => println!("42 is at {i}"),
//!     RankResult::NotFound => println!("42 is absent"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

#[cfg(not(target_endian = "little"))]
compile_error!("rankprobe-store maps little-endian data files zero-copy and requires a little-endian target");

use std::path::PathBuf;
use thiserror::Error;

mod file;
mod key;
mod store;

pub use file::{HEADER_LEN, Layout, write_key_file};
pub use key::{Key, KeyWidth};
pub use store::{KeyStore, RankResult};

/// Result type for key store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while opening, writing, or indexing a key store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The data file could not be opened, inspected, mapped, or written.
    #[error("I/O failure on {path}: {source}")]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file contents do not describe a valid key array.
    #[error("Invalid data file {path}: {reason}")]
    Format {
        /// File being interpreted
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// Keys were not in non-decreasing order.
    #[error("Keys are not sorted: key at index {index} is smaller than its predecessor")]
    Unsorted {
        /// First index that breaks the ordering
        index: usize,
    },

    /// An index outside `[0, len)` was requested.
    ///
    /// This is a caller contract violation rather than a runtime condition.
    #[error("Index {index} out of range for store of {len} keys")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Number of keys in the store
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::OutOfRange { index: 7, len: 5 };
        assert_eq!(err.to_string(), "Index 7 out of range for store of 5 keys");

        let err = StoreError::Unsorted { index: 3 };
        assert!(err.to_string().contains("index 3"));
    }
}
