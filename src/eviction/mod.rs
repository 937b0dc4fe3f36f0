//! Eviction Module
//!
//! Sweep-based LRU eviction for the object cache.
//!
//! # Policies
//! - Background: retunes only the discard threshold, soft limit +10%
//! - Foreground: also shortens its interval, soft limit +200%

mod policy;
mod sweep;
mod tuning;

pub use crate::config::SweepConfig;
pub use policy::{
    SweepPolicy, BACKGROUND_MIN_INTERVAL, FOREGROUND_MAX_INTERVAL, FOREGROUND_MIN_INTERVAL,
};
pub use sweep::{SweepEvictionStrategy, SweepStats};
pub use tuning::{ThresholdBounds, MAX_AGING_WINDOW, MIN_AGING_WINDOW};
