// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Monotonic microsecond clock with a process-wide epoch.
//!
//! `Instant` carries no absolute epoch, so all timestamps are elapsed
//! microseconds since the first use of the clock in this process. Sleep
//! deadlines and aging intervals compare values from this clock only, never
//! wall-clock time.

use std::time::Instant;

use once_cell::sync::Lazy;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Returns microseconds elapsed since the process clock epoch.
///
/// Monotonic and non-decreasing across all threads.
pub fn now_us() -> u64 {
    // u64 micros overflow after ~584k years of uptime.
    u64::try_from(EPOCH.elapsed().as_micros()).unwrap_or(u64::MAX)
}
