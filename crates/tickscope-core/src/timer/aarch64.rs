//! aarch64 counter support.
//!
//! `CNTVCT_EL0` is architectural and constant-rate, so it plays the role the
//! invariant TSC does on x86-64. An `isb` before the read keeps earlier
//! instructions from being reordered past it.

use std::sync::atomic::{Ordering, compiler_fence};

#[inline]
pub(super) fn now() -> u64 {
    compiler_fence(Ordering::SeqCst);

    let ticks: u64;
    unsafe {
        std::arch::asm!(
            "isb",
            "mrs {ticks}, cntvct_el0",
            ticks = out(reg) ticks,
            options(nostack, nomem),
        );
    }

    compiler_fence(Ordering::SeqCst);
    ticks
}

fn counter_frequency_hz() -> u64 {
    let freq: u64;
    unsafe {
        std::arch::asm!(
            "mrs {freq}, cntfrq_el0",
            freq = out(reg) freq,
            options(nostack, nomem),
        );
    }
    freq
}

/// There is no CPUID equivalent here; "invariant" means the frequency
/// register is populated and the counter does not run backwards.
pub(super) fn has_invariant_counter() -> bool {
    if counter_frequency_hz() == 0 {
        return false;
    }

    let a = now();
    let b = now();
    b >= a
}

/// Resolves the nominal counter frequency; first non-zero source wins.
///
/// `CNTFRQ_EL0` is authoritative. Some boards misreport it, so the cpufreq
/// sysfs node and sleep calibration remain as fallbacks.
pub(super) fn nominal_frequency_hz() -> u64 {
    let freq = counter_frequency_hz();
    if freq != 0 {
        return freq;
    }
    if let Some(hz) = super::sysfs_max_frequency_hz() {
        return hz;
    }
    super::calibrated_frequency_hz()
}
