//! Aging-window arithmetic.
//!
//! The discard threshold counts sweep ticks, so its meaning in wall-clock
//! time depends on the sweep interval. These bounds keep the window between
//! [`MIN_AGING_WINDOW`] and [`MAX_AGING_WINDOW`] whatever the interval.

use std::time::Duration;

/// Longest an untouched object survives once sweeps are running.
pub const MAX_AGING_WINDOW: Duration = Duration::from_secs(60);

/// Shortest an untouched object is guaranteed to survive.
pub const MIN_AGING_WINDOW: Duration = Duration::from_secs(9);

/// Allowed range of the discard threshold for one sweep interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdBounds {
    pub min: u64,
    pub max: u64,
}

impl ThresholdBounds {
    pub fn for_interval(interval: Duration) -> Self {
        let interval_ms = interval.as_millis().max(1);
        let max = (MAX_AGING_WINDOW.as_millis() / interval_ms).max(1);
        let min = MIN_AGING_WINDOW
            .as_millis()
            .div_ceil(interval_ms)
            .clamp(1, max);
        Self {
            min: u64::try_from(min).unwrap_or(u64::MAX),
            max: u64::try_from(max).unwrap_or(u64::MAX),
        }
    }

    pub fn clamp(&self, threshold: u64) -> u64 {
        threshold.clamp(self.min, self.max)
    }
}
