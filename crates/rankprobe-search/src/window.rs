//! Estimates and the windows they imply.

/// An approximate rank with a maximum error, as produced by a position oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Estimate {
    /// Predicted rank
    pub approx: usize,
    /// Maximum distance from `approx` to the true rank
    pub error_bound: usize,
}

impl Estimate {
    /// Create an estimate.
    pub const fn new(approx: usize, error_bound: usize) -> Self {
        Self {
            approx,
            error_bound,
        }
    }

    /// Multiply the error bound by `scale`, rounding up and saturating.
    ///
    /// A scale of `1.0` leaves the estimate unchanged.
    #[must_use]
    pub fn scaled(self, scale: f64) -> Self {
        if (scale - 1.0).abs() < f64::EPSILON {
            return self;
        }

        let scaled = (self.error_bound as f64 * scale).ceil();
        let error_bound = if scaled >= usize::MAX as f64 {
            usize::MAX
        } else if scaled <= 0.0 {
            0
        } else {
            scaled as usize
        };

        Self {
            approx: self.approx,
            error_bound,
        }
    }

    /// Distance between the approximate rank and `true_rank`.
    pub const fn error_against(self, true_rank: usize) -> usize {
        self.approx.abs_diff(true_rank)
    }
}

/// Half-open index range `[lo, hi)` searched by a correction strategy.
///
/// Always satisfies `lo <= hi <= len`. Empty windows are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrectionWindow {
    /// First index in the window
    pub lo: usize,
    /// One past the last index in the window
    pub hi: usize,
}

impl CorrectionWindow {
    /// Window `[approx - error_bound, approx + error_bound)` clamped to `[0, len]`.
    ///
    /// A zero error bound yields the empty window positioned at `approx`.
    #[inline]
    pub const fn new(approx: usize, error_bound: usize, len: usize) -> Self {
        let hi = min(approx.saturating_add(error_bound), len);
        let lo = min(approx.saturating_sub(error_bound), hi);
        Self { lo, hi }
    }

    /// Window for an estimate over a store of `len` keys.
    #[inline]
    pub const fn from_estimate(estimate: Estimate, len: usize) -> Self {
        Self::new(estimate.approx, estimate.error_bound, len)
    }

    /// Number of indices in the window.
    #[inline]
    pub const fn len(self) -> usize {
        self.hi - self.lo
    }

    /// Whether the window holds no indices.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.lo == self.hi
    }

    /// Whether `index` falls inside the window.
    #[inline]
    pub const fn contains(self, index: usize) -> bool {
        index >= self.lo && index < self.hi
    }
}

const fn min(a: usize, b: usize) -> usize {
    if a < b { a } else { b }
}
