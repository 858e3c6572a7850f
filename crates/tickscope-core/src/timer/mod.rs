//! Serialized reads of the hardware cycle counter.
//!
//! Scope timings only make sense when the counter is invariant (its rate does
//! not follow frequency scaling or sleep states) and when each read is fenced
//! against speculative reordering. The per-architecture modules take care of
//! both; everything else here is nominal-frequency estimation so consumers
//! can convert ticks to wall time.

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
use self::x86_64 as arch;

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
use self::aarch64 as arch;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod fallback;
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
use self::fallback as arch;

/// Reads the current tick count.
///
/// The read is ordered with respect to surrounding instructions on the calling
/// thread; on unsupported architectures it degrades to nanoseconds since the
/// first call.
#[inline]
pub fn now() -> u64 {
    arch::now()
}

/// Probed description of the machine's cycle counter.
///
/// Instantiated once by the profiler at construction. A timer that is not
/// [`ok`](Self::ok) keeps scope creation functional but the profiler refuses
/// to start aggregation.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    invariant: bool,
    nominal_hz: u64,
}

impl Timer {
    /// Probes the counter and resolves its nominal frequency.
    pub fn detect() -> Self {
        let invariant = arch::has_invariant_counter();
        let nominal_hz = if invariant {
            arch::nominal_frequency_hz()
        } else {
            0
        };

        tracing::debug!(invariant, nominal_hz, "hardware counter probed");
        Self {
            invariant,
            nominal_hz,
        }
    }

    /// True when the counter is invariant and its frequency is known.
    pub fn ok(&self) -> bool {
        self.invariant && self.nominal_hz != 0
    }

    /// Tick rate in Hz, or zero when the counter is unusable.
    pub fn nominal_frequency_hz(&self) -> u64 {
        self.nominal_hz
    }
}

/// Reads the advertised maximum CPU frequency from sysfs, in Hz.
///
/// The cpufreq node is not populated in every environment (containers, WSL),
/// so callers treat `None` as "try the next source".
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
fn sysfs_max_frequency_hz() -> Option<u64> {
    let contents =
        std::fs::read_to_string("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq").ok()?;
    let khz = contents.trim().parse::<u64>().ok()?;
    if khz == 0 {
        return None;
    }
    khz.checked_mul(1000)
}

/// Last-resort frequency estimate: sample the counter across a 100 ms sleep
/// and scale to one second.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
fn calibrated_frequency_hz() -> u64 {
    let t0 = now();
    std::thread::sleep(std::time::Duration::from_millis(100));
    let t1 = now();

    t1.saturating_sub(t0).saturating_mul(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_non_decreasing() {
        let a = now();
        let b = now();
        assert!(b >= a);
    }

    #[test]
    fn detect_reports_frequency_when_ok() {
        let timer = Timer::detect();
        if timer.ok() {
            assert!(timer.nominal_frequency_hz() > 0);
        } else {
            assert_eq!(timer.nominal_frequency_hz(), 0);
        }
    }
}
