//! Background Tasks Module
//!
//! Scheduling primitives the eviction sweeps run on.
//!
//! # Schedulers
//! - `TokioScheduler`: tokio timer, blocking pool for the task body
//! - `ManualScheduler`: caller-driven queue

mod scheduler;

pub use scheduler::{
    ManualScheduler, ScheduledHandle, ScheduledTask, Scheduler, SweepSchedulers, TokioScheduler,
    DEFAULT_DEFERRABLE_SLACK,
};
