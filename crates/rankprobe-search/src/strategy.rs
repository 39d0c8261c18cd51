//! Correction strategies.

use crate::window::{CorrectionWindow, Estimate};
use rankprobe_store::{Key, KeyStore, RankResult};
use std::fmt;
use std::str::FromStr;

/// How an estimate is turned into an exact rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Lower-bound binary search over the correction window
    BoundedBinary,
    /// Outward scan from the approximate rank, limited to the window
    BoundedLinear,
    /// Binary search over the whole store, ignoring the estimate
    FullBinary,
}

impl Strategy {
    /// Every strategy, in reporting order.
    pub const ALL: [Self; 3] = [Self::BoundedBinary, Self::BoundedLinear, Self::FullBinary];

    /// Short name used on the command line and in reports.
    pub const fn name(self) -> &'static str {
        match self {
            Self::BoundedBinary => "binary",
            Self::BoundedLinear => "linear",
            Self::FullBinary => "full",
        }
    }

    /// Whether this strategy uses the estimate at all.
    pub const fn uses_estimate(self) -> bool {
        !matches!(self, Self::FullBinary)
    }

    /// Resolve `key` to its exact rank using `estimate`.
    #[inline]
    pub fn search<K: Key>(self, store: &KeyStore<K>, key: K, estimate: Estimate) -> RankResult {
        match self {
            Self::BoundedBinary => bounded_binary(store, key, estimate),
            Self::BoundedLinear => bounded_linear(store, key, estimate),
            Self::FullBinary => full_binary(store, key),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategy name that matched nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown strategy '{0}' (expected binary, linear or full)")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" | "bounded-binary" => Ok(Self::BoundedBinary),
            "linear" | "bounded-linear" => Ok(Self::BoundedLinear),
            "full" | "full-binary" => Ok(Self::FullBinary),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

/// Lower-bound binary search restricted to the estimate's window.
///
/// Returns the first index in the window holding `key`, or `NotFound` if
/// the window does not contain it. An empty window always misses.
#[inline]
pub fn bounded_binary<K: Key>(store: &KeyStore<K>, key: K, estimate: Estimate) -> RankResult {
    let window = CorrectionWindow::from_estimate(estimate, store.size());
    store.rank_within(key, window.lo, window.hi)
}

/// Scan from the approximate rank toward `key`, one step at a time.
///
/// The scan never leaves the estimate's window: it stops at the window edge
/// or as soon as it passes where `key` would sit. When it lands on a run of
/// duplicates it backs up to the first one still inside the window, so a
/// hit agrees with [`bounded_binary`].
#[inline]
pub fn bounded_linear<K: Key>(store: &KeyStore<K>, key: K, estimate: Estimate) -> RankResult {
    let keys = store.keys();
    let window = CorrectionWindow::from_estimate(estimate, keys.len());
    if window.is_empty() {
        return RankResult::NotFound;
    }

    let mut i = estimate.approx.clamp(window.lo, window.hi - 1);

    if keys[i] < key {
        // Forward: stop at the first key that is not smaller.
        loop {
            i += 1;
            if i == window.hi {
                return RankResult::NotFound;
            }
            if keys[i] >= key {
                break;
            }
        }
        return if keys[i] == key {
            RankResult::Found(i)
        } else {
            RankResult::NotFound
        };
    }

    // Backward: stop at the first key that is not larger.
    while keys[i] > key {
        if i == window.lo {
            return RankResult::NotFound;
        }
        i -= 1;
    }
    if keys[i] != key {
        return RankResult::NotFound;
    }
    while i > window.lo && keys[i - 1] == key {
        i -= 1;
    }
    RankResult::Found(i)
}

/// Binary search over the whole store.
#[inline]
pub fn full_binary<K: Key>(store: &KeyStore<K>, key: K) -> RankResult {
    store.rank(key)
}
