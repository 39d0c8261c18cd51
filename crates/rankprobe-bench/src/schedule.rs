//! Checkpoint schedule.
//!
//! A checkpoint is taken after every power-of-two number of queries below
//! the threshold and after every multiple of the interval from the
//! threshold on. With the defaults (1000, 1000) the curve gets points at
//! 1, 2, 4, ..., 512, then 1000, 2000, 3000, ...

/// When to record cumulative elapsed time during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointSchedule {
    threshold: usize,
    interval: usize,
}

impl Default for CheckpointSchedule {
    fn default() -> Self {
        Self::new(1000, 1000)
    }
}

impl CheckpointSchedule {
    /// Create a schedule. Zero values are raised to 1.
    pub fn new(threshold: usize, interval: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            interval: interval.max(1),
        }
    }

    /// Whether a checkpoint follows the query at `index` (0-based).
    #[inline]
    pub const fn is_checkpoint(&self, index: usize) -> bool {
        let done = index + 1;
        if done < self.threshold {
            done.is_power_of_two()
        } else {
            done % self.interval == 0
        }
    }

    /// Number of checkpoints in a pass over `queries` queries.
    pub fn count(&self, queries: usize) -> usize {
        let below = queries.min(self.threshold.saturating_sub(1));
        let pow2 = if below == 0 {
            0
        } else {
            below.ilog2() as usize + 1
        };

        let linear = if queries >= self.threshold {
            queries / self.interval - (self.threshold - 1) / self.interval
        } else {
            0
        };

        pow2 + linear
    }
}
