//! Sweep policies.
//!
//! The background and foreground sweeps share one state machine and differ
//! only in the knobs below.

use std::time::Duration;

use crate::eviction::tuning::MAX_AGING_WINDOW;

/// Interval floor of the background sweep.
pub const BACKGROUND_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Interval floor of the foreground sweep; also its retuning floor.
pub const FOREGROUND_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Interval ceiling of the foreground sweep.
pub const FOREGROUND_MAX_INTERVAL: Duration = MAX_AGING_WINDOW;

// == Sweep Policy ==
/// Tuning knobs of a sweep eviction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepPolicy {
    /// Label used in logs
    pub name: &'static str,
    /// Size above which a sweep tightens, as a percentage of the preferred max
    pub upper_limit_percent: usize,
    /// Whether tightening shortens the sweep interval before the threshold
    pub retune_interval: bool,
    /// Lowest allowed interval
    pub min_interval: Duration,
    /// Highest allowed interval, if any
    pub max_interval: Option<Duration>,
}

impl SweepPolicy {
    /// Low-overhead sweep that only retunes its discard threshold.
    pub fn background() -> Self {
        Self {
            name: "background",
            upper_limit_percent: 110,
            retune_interval: false,
            min_interval: BACKGROUND_MIN_INTERVAL,
            max_interval: None,
        }
    }

    /// Aggressive sweep that also shortens its own interval under pressure.
    pub fn foreground() -> Self {
        Self {
            name: "foreground",
            upper_limit_percent: 300,
            retune_interval: true,
            min_interval: FOREGROUND_MIN_INTERVAL,
            max_interval: Some(FOREGROUND_MAX_INTERVAL),
        }
    }

    pub fn clamp_interval(&self, interval: Duration) -> Duration {
        let interval = interval.max(self.min_interval);
        match self.max_interval {
            Some(max) => interval.min(max),
            None => interval,
        }
    }

    pub fn upper_limit(&self, preferred_max_size: usize) -> usize {
        preferred_max_size.saturating_mul(self.upper_limit_percent) / 100
    }
}
