//! x86-64 counter support.
//!
//! The time-stamp counter is read behind an `lfence` so that earlier
//! instructions cannot be speculated past the read, and only machines that
//! advertise an invariant TSC are considered usable.

use std::process::Command;
use std::sync::atomic::{Ordering, compiler_fence};

#[inline]
pub(super) fn now() -> u64 {
    compiler_fence(Ordering::SeqCst);

    let ticks: u64;
    unsafe {
        std::arch::asm!(
            "lfence",
            "rdtsc",
            "shl rdx, 32",
            "or rax, rdx",
            out("rax") ticks,
            out("rdx") _,
            options(nostack, nomem),
        );
    }

    compiler_fence(Ordering::SeqCst);
    ticks
}

/// CPUID leaf 0x8000_0007, EDX bit 8: invariant TSC.
pub(super) fn has_invariant_counter() -> bool {
    let leaf = unsafe { std::arch::x86_64::__cpuid(0x8000_0007) };
    leaf.edx & (1 << 8) != 0
}

/// Resolves the nominal TSC frequency; first non-zero source wins.
///
/// The cpufreq sysfs node is the cheapest, but containers frequently leave it
/// unpopulated, hence the `lscpu` and sleep-calibration fallbacks.
pub(super) fn nominal_frequency_hz() -> u64 {
    if let Some(hz) = super::sysfs_max_frequency_hz() {
        return hz;
    }
    if let Some(hz) = lscpu_max_frequency_hz() {
        return hz;
    }
    super::calibrated_frequency_hz()
}

fn lscpu_max_frequency_hz() -> Option<u64> {
    let output = Command::new("lscpu").output().ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with("CPU max MHz:"))?;
    let mhz = line.split(':').nth(1)?.trim().parse::<f64>().ok()?;
    if mhz <= 0.0 {
        return None;
    }

    Some((mhz * 1e6) as u64)
}
