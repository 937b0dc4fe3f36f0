//! Pincache - a concurrent, pinnable object cache
//!
//! Objects live in lazily created, individually locked hash buckets. Callers
//! pin the objects they are using; a sweep eviction strategy ages everything
//! else one tick per firing and discards what stays untouched for too long.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod eviction;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{
    CacheStats, DiscardStrategy, Element, ElementRef, EvictionStrategy, FaultStrategy, ObjectCache,
};
pub use config::{CacheConfig, Config, EvictionMode, SweepConfig};
pub use error::{CacheError, Result};
pub use eviction::{SweepEvictionStrategy, SweepPolicy, SweepStats};
pub use tasks::{ManualScheduler, Scheduler, SweepSchedulers, TokioScheduler};
