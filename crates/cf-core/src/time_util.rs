//! Wall-clock time utilities.
//!
//! Everything in chartfeed is stamped in **milliseconds** since Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// One day in milliseconds.
pub const DAY_MS: u64 = 86_400_000;

/// One hour in milliseconds.
pub const HOUR_MS: u64 = 3_600_000;

/// Current time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Round `ts_ms` down to a multiple of `step_ms`.
#[inline]
pub fn floor_to(ts_ms: u64, step_ms: u64) -> u64 {
    if step_ms == 0 { ts_ms } else { ts_ms - ts_ms % step_ms }
}

/// Round `ts_ms` up to a multiple of `step_ms`.
#[inline]
pub fn ceil_to(ts_ms: u64, step_ms: u64) -> u64 {
    let floor = floor_to(ts_ms, step_ms);
    if floor == ts_ms { ts_ms } else { floor.saturating_add(step_ms) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(floor_to(3_599_999, HOUR_MS), 0);
        assert_eq!(ceil_to(1, HOUR_MS), HOUR_MS);
        assert_eq!(ceil_to(HOUR_MS, HOUR_MS), HOUR_MS);
        assert_eq!(floor_to(42, 0), 42);
    }

    #[test]
    fn now_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }
}
