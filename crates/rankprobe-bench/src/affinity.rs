//! CPU pinning.
//!
//! Called once at startup, before anything is loaded, so the whole run
//! stays on one core.

use crate::Result;

/// Pin the calling thread to `core`.
#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
pub fn pin_to_core(core: usize) -> Result<()> {
    use crate::BenchError;

    if core >= libc::CPU_SETSIZE as usize {
        return Err(BenchError::Affinity {
            core,
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        });
    }

    let rc = unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
    };

    if rc != 0 {
        return Err(BenchError::Affinity {
            core,
            source: std::io::Error::last_os_error(),
        });
    }

    tracing::info!("Pinned to core {}", core);
    Ok(())
}

/// Pin the calling thread to `core`.
///
/// Not supported on this platform; logs a warning and continues unpinned.
#[cfg(not(target_os = "linux"))]
pub fn pin_to_core(core: usize) -> Result<()> {
    tracing::warn!("CPU pinning is not supported on this platform, ignoring core {}", core);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn test_rejects_core_past_set_size() {
        assert!(pin_to_core(1 << 20).is_err());
    }

    #[test]
    fn test_pin_to_first_core() {
        // Sandboxed runners may restrict affinity; only a clean error is required.
        if let Err(err) = pin_to_core(0) {
            assert!(err.to_string().contains("core 0"));
        }
    }
}
