//! Sweep Eviction Strategy
//!
//! A self-rescheduling task that ages the cache one tick per firing and
//! evicts every unpinned element left untouched for longer than the
//! discard threshold. The threshold, and for the foreground policy the
//! interval, are retuned against the cache's preferred maximum size.

use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::cache::{CacheElementEnumerator, Element, EvictionStrategy, ObjectCache};
use crate::config::SweepConfig;
use crate::eviction::policy::SweepPolicy;
use crate::eviction::tuning::ThresholdBounds;
use crate::tasks::{ScheduledHandle, SweepSchedulers};

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// == Sweep Stats ==
/// Counters and current tuning of a sweep strategy.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStats {
    pub firings: u64,
    pub sweeps: u64,
    pub evicted: u64,
    pub failed_sweeps: u64,
    pub discard_threshold: u64,
    pub sweep_interval_ms: u64,
    pub preferred_max_size: usize,
    pub below_soft_limit: bool,
}

// == Internal State ==
struct Control<K, V> {
    canceled: bool,
    cache: Option<Weak<ObjectCache<K, V>>>,
    handle: Option<Box<dyn ScheduledHandle>>,
}

struct Tuning {
    preferred_max_size: usize,
    /// Interval last requested by the owner; relaxing never goes past it.
    configured_interval: Duration,
    interval: Duration,
    bounds: ThresholdBounds,
    below_limit_firings: u64,
}

#[derive(Default)]
struct PendingChanges {
    sweep_interval: Option<Duration>,
    preferred_max_size: Option<usize>,
}

// == Sweep Eviction Strategy ==
/// Sweep-based LRU eviction for an [`ObjectCache`].
///
/// Lock order is `control` before the scheduler's own lock, and `tuning`
/// before `stats`. The discard threshold is atomic because
/// [`EvictionStrategy::can_be_discarded`] is consulted by the cache while a
/// firing holds `tuning`.
pub struct SweepEvictionStrategy<K, V> {
    cache_name: String,
    policy: SweepPolicy,
    schedulers: SweepSchedulers,
    control: Mutex<Control<K, V>>,
    tuning: Mutex<Tuning>,
    pending: Mutex<PendingChanges>,
    discard_threshold: AtomicU64,
    stats: Mutex<SweepStats>,
}

impl<K, V> SweepEvictionStrategy<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn new(
        cache: &Arc<ObjectCache<K, V>>,
        config: SweepConfig,
        policy: SweepPolicy,
        schedulers: SweepSchedulers,
    ) -> Self {
        let interval = policy.clamp_interval(config.sweep_interval);
        let bounds = ThresholdBounds::for_interval(interval);

        Self {
            cache_name: cache.name().to_string(),
            policy,
            schedulers,
            control: Mutex::new(Control {
                canceled: false,
                cache: Some(Arc::downgrade(cache)),
                handle: None,
            }),
            tuning: Mutex::new(Tuning {
                preferred_max_size: config.preferred_max_size,
                configured_interval: interval,
                interval,
                bounds,
                below_limit_firings: 0,
            }),
            pending: Mutex::new(PendingChanges::default()),
            discard_threshold: AtomicU64::new(bounds.max),
            stats: Mutex::new(SweepStats {
                discard_threshold: bounds.max,
                sweep_interval_ms: millis(interval),
                preferred_max_size: config.preferred_max_size,
                ..SweepStats::default()
            }),
        }
    }

    /// Creates a strategy, installs it on `cache` and schedules the first
    /// firing one interval from now on the deferrable scheduler.
    pub fn install(
        cache: &Arc<ObjectCache<K, V>>,
        config: SweepConfig,
        policy: SweepPolicy,
        schedulers: SweepSchedulers,
    ) -> Arc<Self> {
        let strategy = Arc::new(Self::new(cache, config, policy, schedulers));
        cache.set_eviction_strategy(strategy.clone());

        let interval = strategy.tuning.lock().interval;
        info!(
            cache = %strategy.cache_name,
            policy = policy.name,
            preferred_max_size = config.preferred_max_size,
            interval_ms = millis(interval),
            threshold = strategy.discard_threshold(),
            "Sweep eviction installed"
        );
        strategy.schedule_next(interval, true);
        strategy
    }

    /// Installs a background sweep.
    pub fn background(
        cache: &Arc<ObjectCache<K, V>>,
        config: SweepConfig,
        schedulers: SweepSchedulers,
    ) -> Arc<Self> {
        Self::install(cache, config, SweepPolicy::background(), schedulers)
    }

    /// Installs a foreground sweep.
    pub fn foreground(
        cache: &Arc<ObjectCache<K, V>>,
        config: SweepConfig,
        schedulers: SweepSchedulers,
    ) -> Arc<Self> {
        Self::install(cache, config, SweepPolicy::foreground(), schedulers)
    }

    // == Configuration ==
    /// Requests a new sweep interval, applied at the next firing. The
    /// threshold then restarts at the new interval's maximum.
    pub fn set_sweep_interval(&self, interval: Duration) {
        self.pending.lock().sweep_interval = Some(interval);
        debug!(cache = %self.cache_name, interval_ms = millis(interval), "Sweep interval change queued");
    }

    /// Requests a new soft size limit, applied at the next firing.
    pub fn set_preferred_max_size(&self, preferred_max_size: usize) {
        self.pending.lock().preferred_max_size = Some(preferred_max_size);
        debug!(cache = %self.cache_name, preferred_max_size, "Preferred max size change queued");
    }

    pub fn policy(&self) -> &SweepPolicy {
        &self.policy
    }

    /// Ticks an element must stay untouched before it may be discarded.
    pub fn discard_threshold(&self) -> u64 {
        self.discard_threshold.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SweepStats {
        let mut stats = self.stats.lock().clone();
        stats.discard_threshold = self.discard_threshold();
        stats
    }

    pub fn is_canceled(&self) -> bool {
        self.control.lock().canceled
    }

    // == Scheduling ==
    fn schedule_next(self: &Arc<Self>, delay: Duration, deferrable: bool) {
        let mut control = self.control.lock();
        if control.canceled {
            return;
        }
        let this = Arc::clone(self);
        let handle = self
            .schedulers
            .pick(deferrable)
            .schedule(Box::new(move || this.fire()), delay);
        control.handle = Some(handle);
    }

    fn fire(self: &Arc<Self>) {
        let cache = {
            let mut control = self.control.lock();
            if control.canceled {
                return;
            }
            control.handle = None;
            control.cache.as_ref().and_then(Weak::upgrade)
        };
        let Some(cache) = cache else {
            debug!(cache = %self.cache_name, "Cache dropped, sweep stopped");
            return;
        };

        let below_soft_limit = match panic::catch_unwind(AssertUnwindSafe(|| self.run(&cache))) {
            Ok(below) => below,
            Err(_) => {
                let mut stats = self.stats.lock();
                stats.firings += 1;
                stats.failed_sweeps += 1;
                error!(cache = %self.cache_name, "Sweep failed, rescheduling");
                false
            }
        };
        drop(cache);

        let interval = self.tuning.lock().interval;
        self.schedule_next(interval, below_soft_limit);
    }

    // == Sweeping ==
    /// One firing. Returns true if the cache was under its soft limit.
    fn run(&self, cache: &ObjectCache<K, V>) -> bool {
        let mut tuning = self.tuning.lock();
        self.apply_pending(&mut tuning);
        let tick = cache.advance_sweep_tick();
        let size = cache.size();

        if size < tuning.preferred_max_size {
            tuning.below_limit_firings += 1;
            if tuning.below_limit_firings > tuning.bounds.max {
                tuning.below_limit_firings = 0;
                self.relax(&mut tuning);
            }
            self.record_firing(&tuning, 0, 0, true);
            return true;
        }
        tuning.below_limit_firings = 0;

        let mut enumerator = cache.enumerate_elements();
        let mut evicted = self.sweep(cache, &mut enumerator);
        let mut sweeps = 1;
        let upper_limit = self.policy.upper_limit(tuning.preferred_max_size);
        if cache.size() > upper_limit && self.tighten(&mut tuning) {
            enumerator.reset();
            evicted += self.sweep(cache, &mut enumerator);
            sweeps += 1;
        }

        debug!(
            cache = %self.cache_name,
            tick,
            size_before = size,
            size_after = cache.size(),
            evicted,
            threshold = self.discard_threshold(),
            "Sweep complete"
        );
        self.record_firing(&tuning, sweeps, evicted, false);
        false
    }

    fn sweep(&self, cache: &ObjectCache<K, V>, enumerator: &mut CacheElementEnumerator<'_, K, V>) -> u64 {
        let mut evicted = 0;
        while let Some(element) = enumerator.next_element() {
            if self.can_be_discarded(cache, &element) && cache.evict(element.key()) {
                evicted += 1;
            }
        }
        evicted
    }

    fn record_firing(&self, tuning: &Tuning, sweeps: u64, evicted: u64, below_soft_limit: bool) {
        let mut stats = self.stats.lock();
        stats.firings += 1;
        stats.sweeps += sweeps;
        stats.evicted += evicted;
        stats.sweep_interval_ms = millis(tuning.interval);
        stats.preferred_max_size = tuning.preferred_max_size;
        stats.below_soft_limit = below_soft_limit;
    }

    // == Tuning ==
    fn apply_pending(&self, tuning: &mut Tuning) {
        let pending = std::mem::take(&mut *self.pending.lock());
        if let Some(preferred_max_size) = pending.preferred_max_size {
            tuning.preferred_max_size = preferred_max_size;
            info!(cache = %self.cache_name, preferred_max_size, "Preferred max size applied");
        }
        if let Some(interval) = pending.sweep_interval {
            let interval = self.policy.clamp_interval(interval);
            tuning.configured_interval = interval;
            tuning.interval = interval;
            tuning.bounds = ThresholdBounds::for_interval(interval);
            tuning.below_limit_firings = 0;
            self.discard_threshold.store(tuning.bounds.max, Ordering::Release);
            info!(
                cache = %self.cache_name,
                interval_ms = millis(interval),
                threshold = tuning.bounds.max,
                "Sweep interval applied"
            );
        }
    }

    /// Makes sweeps more aggressive by one step. Returns false at the floor.
    fn tighten(&self, tuning: &mut Tuning) -> bool {
        if self.policy.retune_interval && tuning.interval > self.policy.min_interval {
            let shorter = (tuning.interval / 2).max(self.policy.min_interval);
            self.set_interval(tuning, shorter);
            info!(cache = %self.cache_name, interval_ms = millis(shorter), "Sweep interval shortened");
            return true;
        }
        let threshold = self.discard_threshold();
        if threshold > tuning.bounds.min {
            self.discard_threshold.store(threshold - 1, Ordering::Release);
            info!(cache = %self.cache_name, threshold = threshold - 1, "Discard threshold lowered");
            return true;
        }
        false
    }

    /// Makes sweeps less aggressive by one step. Returns false at the ceiling.
    fn relax(&self, tuning: &mut Tuning) -> bool {
        let threshold = self.discard_threshold();
        if threshold < tuning.bounds.max {
            self.discard_threshold.store(threshold + 1, Ordering::Release);
            debug!(cache = %self.cache_name, threshold = threshold + 1, "Discard threshold raised");
            return true;
        }
        if self.policy.retune_interval && tuning.interval < tuning.configured_interval {
            let longer = (tuning.interval * 2).min(tuning.configured_interval);
            self.set_interval(tuning, longer);
            debug!(cache = %self.cache_name, interval_ms = millis(longer), "Sweep interval lengthened");
            return true;
        }
        false
    }

    fn set_interval(&self, tuning: &mut Tuning, interval: Duration) {
        tuning.interval = interval;
        tuning.bounds = ThresholdBounds::for_interval(interval);
        let clamped = tuning.bounds.clamp(self.discard_threshold());
        self.discard_threshold.store(clamped, Ordering::Release);
    }
}

impl<K, V> EvictionStrategy<K, V> for SweepEvictionStrategy<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn can_be_discarded(&self, cache: &ObjectCache<K, V>, element: &Element<K, V>) -> bool {
        element.pin_count() == 0
            && !element.is_ineligible_for_eviction()
            && cache.ticks_since_touched(element) > self.discard_threshold()
    }

    fn cancel(&self) {
        let mut control = self.control.lock();
        if control.canceled {
            return;
        }
        control.canceled = true;
        control.cache = None;
        if let Some(handle) = control.handle.take() {
            handle.cancel();
        }
        info!(cache = %self.cache_name, "Sweep eviction canceled");
    }
}

impl<K, V> fmt::Debug for SweepEvictionStrategy<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweepEvictionStrategy")
            .field("cache", &self.cache_name)
            .field("policy", &self.policy.name)
            .field("discard_threshold", &self.discard_threshold.load(Ordering::Relaxed))
            .finish()
    }
}
