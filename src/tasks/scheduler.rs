//! Delayed task scheduling
//!
//! Eviction strategies run as one-shot tasks that reschedule themselves.
//! A [`Scheduler`] runs a task once after a delay and hands back a handle
//! that can withdraw it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::warn;

/// Default coalescing granularity of a deferrable tokio scheduler.
pub const DEFAULT_DEFERRABLE_SLACK: Duration = Duration::from_secs(1);

/// A unit of work run once by a [`Scheduler`].
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

// == Traits ==
/// Withdraws a scheduled task. Cancelling twice, or after the task ran, is
/// a no-op.
pub trait ScheduledHandle: Send + Sync {
    fn cancel(&self);
}

/// Runs a task once after a delay.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: ScheduledTask, delay: Duration) -> Box<dyn ScheduledHandle>;
}

// == Scheduler Pair ==
/// The two pools a sweep strategy reschedules itself on: `primary` while
/// the cache is at or over its soft limit, `deferrable` while it is under.
#[derive(Clone)]
pub struct SweepSchedulers {
    pub primary: Arc<dyn Scheduler>,
    pub deferrable: Arc<dyn Scheduler>,
}

impl SweepSchedulers {
    pub fn new(primary: Arc<dyn Scheduler>, deferrable: Arc<dyn Scheduler>) -> Self {
        Self {
            primary,
            deferrable,
        }
    }

    /// Uses one scheduler for both priorities.
    pub fn shared(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            primary: Arc::clone(&scheduler),
            deferrable: scheduler,
        }
    }

    /// Tokio-backed pair; the deferrable side coalesces wakeups to
    /// [`DEFAULT_DEFERRABLE_SLACK`].
    pub fn tokio(runtime: Handle) -> Self {
        Self {
            primary: Arc::new(TokioScheduler::new(runtime.clone())),
            deferrable: Arc::new(TokioScheduler::deferrable(
                runtime,
                DEFAULT_DEFERRABLE_SLACK,
            )),
        }
    }

    pub(crate) fn pick(&self, deferrable: bool) -> &Arc<dyn Scheduler> {
        if deferrable {
            &self.deferrable
        } else {
            &self.primary
        }
    }
}

// == Tokio Scheduler ==
/// Sleeps on the tokio timer, then runs the task on the blocking pool.
///
/// With a non-zero slack every delay is rounded up to a multiple of it,
/// batching low-priority wakeups.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
    slack: Duration,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            slack: Duration::ZERO,
        }
    }

    pub fn deferrable(runtime: Handle, slack: Duration) -> Self {
        Self { runtime, slack }
    }

    fn effective_delay(&self, delay: Duration) -> Duration {
        if self.slack.is_zero() {
            return delay;
        }
        let slack = self.slack.as_nanos();
        let rounded = delay.as_nanos().div_ceil(slack) * slack;
        Duration::from_nanos(u64::try_from(rounded).unwrap_or(u64::MAX))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: ScheduledTask, delay: Duration) -> Box<dyn ScheduledHandle> {
        let delay = self.effective_delay(delay);
        let join = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = tokio::task::spawn_blocking(task).await {
                warn!(error = %err, "Scheduled task did not complete");
            }
        });
        Box::new(TokioHandle(join.abort_handle()))
    }
}

struct TokioHandle(AbortHandle);

impl ScheduledHandle for TokioHandle {
    fn cancel(&self) {
        self.0.abort();
    }
}

// == Manual Scheduler ==
#[derive(Default)]
struct ManualQueue {
    next_id: u64,
    entries: Vec<(u64, Duration, ScheduledTask)>,
}

/// Queues tasks until the owner runs them, ignoring delays.
///
/// Suited to driving sweeps from an existing loop, and to tests.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<ManualQueue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.lock().entries.len()
    }

    /// Delays of the queued tasks, oldest first.
    pub fn pending_delays(&self) -> Vec<Duration> {
        self.queue
            .lock()
            .entries
            .iter()
            .map(|(_, delay, _)| *delay)
            .collect()
    }

    /// Runs every task queued before the call and returns how many ran.
    /// Tasks scheduled while running wait for the next call.
    pub fn run_pending(&self) -> usize {
        let entries = std::mem::take(&mut self.queue.lock().entries);
        let count = entries.len();
        for (_, _, task) in entries {
            task();
        }
        count
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: ScheduledTask, delay: Duration) -> Box<dyn ScheduledHandle> {
        let mut queue = self.queue.lock();
        let id = queue.next_id;
        queue.next_id += 1;
        queue.entries.push((id, delay, task));
        Box::new(ManualHandle {
            queue: Arc::downgrade(&self.queue),
            id,
        })
    }
}

struct ManualHandle {
    queue: Weak<Mutex<ManualQueue>>,
    id: u64,
}

impl ScheduledHandle for ManualHandle {
    fn cancel(&self) {
        let Some(queue) = self.queue.upgrade() else {
            return;
        };
        let removed = {
            let mut queue = queue.lock();
            queue
                .entries
                .iter()
                .position(|(id, _, _)| *id == self.id)
                .map(|i| queue.entries.remove(i))
        };
        drop(removed);
    }
}
