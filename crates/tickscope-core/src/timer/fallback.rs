//! Portable fallback for architectures without a supported cycle counter.
//!
//! Keeps scope creation functional by counting nanoseconds since the first
//! read, but reports the counter as unusable so aggregation never starts.

use std::sync::OnceLock;
use std::time::Instant;

#[inline]
pub(super) fn now() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();

    let start = START.get_or_init(Instant::now);
    start.elapsed().as_nanos().min(u64::MAX as u128) as u64
}

pub(super) fn has_invariant_counter() -> bool {
    false
}

pub(super) fn nominal_frequency_hz() -> u64 {
    0
}
