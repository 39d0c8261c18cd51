//! Process resource counters sampled around timed passes.
//!
//! Uses `getrusage(RUSAGE_SELF)` on Unix. Other platforms report zeros.

use std::fmt;

/// Page fault and context switch counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceUsage {
    /// Page faults served without I/O
    pub minor_faults: u64,
    /// Page faults that required I/O
    pub major_faults: u64,
    /// Context switches from blocking
    pub voluntary_switches: u64,
    /// Context switches from preemption
    pub involuntary_switches: u64,
}

impl ResourceUsage {
    /// Current counters for this process.
    #[cfg(unix)]
    #[allow(unsafe_code)]
    pub fn snapshot() -> Self {
        let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
        let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, usage.as_mut_ptr()) };
        if rc != 0 {
            tracing::warn!(
                "getrusage failed: {}",
                std::io::Error::last_os_error()
            );
            return Self::default();
        }
        let usage = unsafe { usage.assume_init() };

        Self {
            minor_faults: counter(usage.ru_minflt),
            major_faults: counter(usage.ru_majflt),
            voluntary_switches: counter(usage.ru_nvcsw),
            involuntary_switches: counter(usage.ru_nivcsw),
        }
    }

    /// Current counters for this process.
    #[cfg(not(unix))]
    pub fn snapshot() -> Self {
        Self::default()
    }

    /// Counters accumulated since `earlier`.
    #[must_use]
    pub const fn since(&self, earlier: &Self) -> Self {
        Self {
            minor_faults: self.minor_faults.saturating_sub(earlier.minor_faults),
            major_faults: self.major_faults.saturating_sub(earlier.major_faults),
            voluntary_switches: self
                .voluntary_switches
                .saturating_sub(earlier.voluntary_switches),
            involuntary_switches: self
                .involuntary_switches
                .saturating_sub(earlier.involuntary_switches),
        }
    }
}

impl fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "minor faults {}, major faults {}, voluntary switches {}, involuntary switches {}",
            self.minor_faults, self.major_faults, self.voluntary_switches, self.involuntary_switches
        )
    }
}

#[cfg(unix)]
fn counter(value: libc::c_long) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
