//! Cache Store Module
//!
//! The fixed-size hash table of lazily created, individually locked buckets.
//! Owns pinning, insertion and removal, the aggregate counters and the
//! global sweep tick, and carries out evictions chosen by an eviction
//! strategy.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::bucket::{ArrayBucket, Bucket};
use crate::cache::element::{Element, ElementRef};
use crate::cache::enumerator::CacheElementEnumerator;
use crate::cache::stats::{CacheStats, LookupCounters};
use crate::cache::strategy::{DiscardStrategy, EvictionStrategy, FaultStrategy};
use crate::cache::unique_bucket::UniqueBucket;
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

type BucketSlot<K, V> = OnceCell<Mutex<Box<dyn Bucket<K, V>>>>;

// == Sweep Tick Arithmetic ==
/// Tick following `tick`. Wraps to 1, never to 0.
pub(crate) fn next_tick(tick: u64) -> u64 {
    if tick == u64::MAX {
        1
    } else {
        tick + 1
    }
}

/// Sweep ticks elapsed from `then` to `now`, across at most one wrap.
pub(crate) fn ticks_between(then: u64, now: u64) -> u64 {
    if then <= now {
        now - then
    } else {
        (u64::MAX - then) + now
    }
}

/// Smallest prime that is at least `n` (and at least 2).
pub(crate) fn next_prime(n: usize) -> usize {
    fn is_prime(n: usize) -> bool {
        if n < 2 {
            return false;
        }
        let mut d = 2;
        while d * d <= n {
            if n % d == 0 {
                return false;
            }
            d += 1;
        }
        true
    }

    let mut candidate = n.max(2);
    while !is_prime(candidate) {
        candidate += 1;
    }
    candidate
}

// == Object Cache ==
/// Concurrent associative cache of pinnable objects.
///
/// Every bucket has its own lock; operations on different buckets never
/// contend. The object count and the remaining statistics sit behind a
/// separate counter lock that is only ever taken after (or without) a
/// bucket lock; hits and misses are plain atomics.
pub struct ObjectCache<K, V> {
    name: String,
    unique_keys: bool,
    buckets: Box<[BucketSlot<K, V>]>,
    counters: Mutex<CacheStats>,
    lookups: LookupCounters,
    sweep_tick: AtomicU64,
    fault_strategy: RwLock<Option<Arc<dyn FaultStrategy<K, V>>>>,
    discard_strategy: RwLock<Option<Arc<dyn DiscardStrategy<K, V>>>>,
    eviction_strategy: RwLock<Option<Arc<dyn EvictionStrategy<K, V>>>>,
}

impl<K, V> ObjectCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty cache. The bucket count is rounded up to a prime.
    pub fn new(config: CacheConfig) -> Self {
        let bucket_count = next_prime(config.bucket_count);
        let buckets = (0..bucket_count)
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        debug!(
            cache = %config.name,
            bucket_count,
            unique_keys = config.unique_keys,
            "Object cache created"
        );

        Self {
            name: config.name,
            unique_keys: config.unique_keys,
            buckets,
            counters: Mutex::new(CacheStats::new()),
            lookups: LookupCounters::default(),
            sweep_tick: AtomicU64::new(1),
            fault_strategy: RwLock::new(None),
            discard_strategy: RwLock::new(None),
            eviction_strategy: RwLock::new(None),
        }
    }

    // == Accessors ==
    /// Diagnostic name of the cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of hash buckets (always prime).
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of objects currently cached.
    pub fn size(&self) -> usize {
        self.counters.lock().total_objects
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Snapshot of the aggregate counters.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.counters.lock().clone();
        self.lookups.fill(&mut stats);
        stats
    }

    // == Strategy Wiring ==
    pub fn set_fault_strategy(&self, strategy: Arc<dyn FaultStrategy<K, V>>) {
        *self.fault_strategy.write() = Some(strategy);
    }

    pub fn set_discard_strategy(&self, strategy: Arc<dyn DiscardStrategy<K, V>>) {
        *self.discard_strategy.write() = Some(strategy);
    }

    /// Installs `strategy`, cancelling any strategy it replaces.
    pub fn set_eviction_strategy(&self, strategy: Arc<dyn EvictionStrategy<K, V>>) {
        let previous = self.eviction_strategy.write().replace(strategy);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Cancels and detaches the installed eviction strategy.
    pub fn terminate(&self) {
        let strategy = self.eviction_strategy.write().take();
        if let Some(strategy) = strategy {
            strategy.cancel();
            info!(cache = %self.name, "Eviction strategy terminated");
        }
    }

    // == Sweep Tick ==
    pub(crate) fn current_tick(&self) -> u64 {
        self.sweep_tick.load(Ordering::Acquire)
    }

    /// Advances the global sweep tick and returns the new value.
    pub(crate) fn advance_sweep_tick(&self) -> u64 {
        let previous = self
            .sweep_tick
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |tick| {
                Some(next_tick(tick))
            })
            .unwrap_or_else(|tick| tick);
        next_tick(previous)
    }

    #[cfg(test)]
    pub(crate) fn set_sweep_tick(&self, tick: u64) {
        self.sweep_tick.store(tick, Ordering::Release);
    }

    /// Sweep ticks elapsed since `element` was last touched.
    pub fn ticks_since_touched(&self, element: &Element<K, V>) -> u64 {
        ticks_between(element.last_touched(), self.current_tick())
    }

    fn touch(&self, element: &Element<K, V>) {
        element.touch(self.current_tick());
    }

    // == Bucket Lookup ==
    fn slot_index(&self, key: &K) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.buckets.len()
    }

    /// Returns the bucket for slot `index`, creating it on first use.
    fn bucket(&self, index: usize) -> &Mutex<Box<dyn Bucket<K, V>>> {
        self.buckets[index].get_or_init(|| {
            let bucket: Box<dyn Bucket<K, V>> = if self.unique_keys {
                Box::new(UniqueBucket::new(index))
            } else {
                Box::new(ArrayBucket::new(index))
            };
            Mutex::new(bucket)
        })
    }

    fn existing_bucket(&self, index: usize) -> Option<&Mutex<Box<dyn Bucket<K, V>>>> {
        self.buckets.get(index).and_then(OnceCell::get)
    }

    /// Copies the contents of slot `index` into `dest` under its lock.
    pub(crate) fn copy_bucket(&self, index: usize, dest: &mut Vec<ElementRef<K, V>>) {
        if let Some(bucket) = self.existing_bucket(index) {
            bucket.lock().copy_into(dest);
        }
    }

    fn not_found(key: &K) -> CacheError {
        CacheError::NotFound(format!("{:?}", key))
    }

    fn record_lookup(&self, hit: bool) {
        self.lookups.record(hit);
    }

    // == Lookups ==
    /// Returns true if an object is cached under `key`. Creates no bucket.
    pub fn contains(&self, key: &K) -> bool {
        self.existing_bucket(self.slot_index(key))
            .is_some_and(|bucket| bucket.lock().find_by_key(key).is_some())
    }

    /// Looks up `key` and pins the object if found.
    ///
    /// The caller owns the pin and must release it with [`unpin`](Self::unpin).
    pub fn find(&self, key: &K) -> Option<V> {
        let found = self.existing_bucket(self.slot_index(key)).and_then(|bucket| {
            let guard = bucket.lock();
            guard.find_by_key(key).map(|element| {
                element.adjust_pins(1);
                self.touch(&element);
                element.value().clone()
            })
        });
        self.record_lookup(found.is_some());
        found
    }

    /// Looks up `key` without pinning, touches it and adds `delta` to its
    /// pin count.
    ///
    /// Fails with [`CacheError::NotPinned`] if the adjustment would leave a
    /// negative pin count, and with [`CacheError::InvalidRequest`] if it
    /// would overflow; nothing changes in either case.
    pub fn find_unpinned_adjust(&self, key: &K, delta: i32) -> Result<Option<V>> {
        let found = match self.existing_bucket(self.slot_index(key)) {
            Some(bucket) => {
                let guard = bucket.lock();
                match guard.find_by_key(key) {
                    Some(element) => {
                        match element.pin_count().checked_add(delta) {
                            Some(adjusted) if adjusted >= 0 => {}
                            Some(_) => {
                                return Err(CacheError::NotPinned(format!("{:?}", key)));
                            }
                            None => {
                                return Err(CacheError::InvalidRequest(format!(
                                    "pin count of {:?} would overflow",
                                    key
                                )));
                            }
                        }
                        self.touch(&element);
                        element.adjust_pins(delta);
                        Some(element.value().clone())
                    }
                    None => None,
                }
            }
            None => None,
        };
        self.record_lookup(found.is_some());
        Ok(found)
    }

    /// Looks up `key` without pinning, faulting the value in on a miss.
    ///
    /// The fault strategy runs with the bucket locked, which makes the
    /// check-then-insert atomic for every key sharing that bucket. Callers
    /// must not unpin the returned value.
    pub fn find_or_fault(&self, key: &K) -> Result<Option<V>> {
        let fault = self.fault_strategy.read().clone();
        let mut guard = self.bucket(self.slot_index(key)).lock();

        if let Some(element) = guard.find_by_key(key) {
            self.touch(&element);
            let value = element.value().clone();
            drop(guard);
            self.record_lookup(true);
            return Ok(Some(value));
        }

        let Some(fault) = fault else {
            drop(guard);
            self.record_lookup(false);
            return Ok(None);
        };

        let faulted = match fault.fault_on_key(self, key) {
            Ok(faulted) => faulted,
            Err(source) => {
                drop(guard);
                self.record_lookup(false);
                return Err(CacheError::Fault {
                    key: format!("{:?}", key),
                    source,
                });
            }
        };

        let Some(value) = faulted else {
            drop(guard);
            self.record_lookup(false);
            return Ok(None);
        };

        let element = guard.insert_by_key(key.clone(), value.clone())?;
        self.touch(&element);
        drop(guard);

        self.record_lookup(false);
        let mut counters = self.counters.lock();
        counters.record_fault();
        counters.object_added();
        Ok(Some(value))
    }

    // == Insertion ==
    /// Inserts an object pinned once on behalf of the caller.
    pub fn insert(&self, key: K, value: V) -> Result<ElementRef<K, V>> {
        let element = {
            let mut guard = self.bucket(self.slot_index(&key)).lock();
            let element = guard.insert_by_key(key, value)?;
            element.adjust_pins(1);
            element
        };
        self.counters.lock().object_added();
        Ok(element)
    }

    /// Inserts an unpinned object, touched so it starts its aging window now.
    pub fn insert_unpinned(&self, key: K, value: V) -> Result<ElementRef<K, V>> {
        let element = {
            let mut guard = self.bucket(self.slot_index(&key)).lock();
            let element = guard.insert_by_key(key, value)?;
            self.touch(&element);
            element
        };
        self.counters.lock().object_added();
        Ok(element)
    }

    // == Pinning ==
    /// Pins the object under `key` and returns the new pin count.
    pub fn pin(&self, key: &K) -> Result<i32> {
        let bucket = self
            .existing_bucket(self.slot_index(key))
            .ok_or_else(|| Self::not_found(key))?;
        let guard = bucket.lock();
        let element = guard.find_by_key(key).ok_or_else(|| Self::not_found(key))?;
        Ok(element.adjust_pins(1))
    }

    /// Pins `element` directly, without hashing its key.
    pub fn pin_element(&self, element: &ElementRef<K, V>) -> Result<i32> {
        let bucket = self
            .existing_bucket(element.bucket_index())
            .ok_or_else(|| Self::not_found(element.key()))?;
        let _guard = bucket.lock();
        if element.is_evicted() {
            return Err(Self::not_found(element.key()));
        }
        Ok(element.adjust_pins(1))
    }

    /// Releases one pin on the object under `key` and returns the
    /// remaining count.
    pub fn unpin(&self, key: &K) -> Result<i32> {
        let bucket = self
            .existing_bucket(self.slot_index(key))
            .ok_or_else(|| Self::not_found(key))?;
        let guard = bucket.lock();
        let element = guard.find_by_key(key).ok_or_else(|| Self::not_found(key))?;
        self.release_pin(&element)
    }

    /// Releases one pin on `element` and returns the remaining count.
    pub fn unpin_element(&self, element: &ElementRef<K, V>) -> Result<i32> {
        let bucket = self
            .existing_bucket(element.bucket_index())
            .ok_or_else(|| Self::not_found(element.key()))?;
        let _guard = bucket.lock();
        if element.is_evicted() {
            return Err(Self::not_found(element.key()));
        }
        self.release_pin(element)
    }

    fn release_pin(&self, element: &Element<K, V>) -> Result<i32> {
        if element.pin_count() <= 0 {
            return Err(CacheError::NotPinned(format!("{:?}", element.key())));
        }
        self.touch(element);
        Ok(element.adjust_pins(-1))
    }

    /// Excludes `element` from eviction for the rest of its life in the cache.
    pub fn mark_ineligible_for_eviction(&self, element: &ElementRef<K, V>) -> Result<()> {
        let bucket = self
            .existing_bucket(element.bucket_index())
            .ok_or_else(|| Self::not_found(element.key()))?;
        let _guard = bucket.lock();
        if element.is_evicted() {
            return Err(Self::not_found(element.key()));
        }
        element.mark_ineligible();
        Ok(())
    }

    // == Removal ==
    /// Removes the object under `key`.
    ///
    /// With `drop_ref` the caller's own pin is released as part of the
    /// removal; any other outstanding pin is a [`CacheError::PinConflict`].
    pub fn remove(&self, key: &K, drop_ref: bool) -> Result<Option<V>> {
        let Some(bucket) = self.existing_bucket(self.slot_index(key)) else {
            return Ok(None);
        };
        let removed = {
            let mut guard = bucket.lock();
            let removed = guard.remove_by_key(key, drop_ref)?;
            if let Some(element) = &removed {
                element.mark_evicted();
            }
            removed
        };
        Ok(removed.map(|element| {
            self.counters.lock().object_removed();
            element.value().clone()
        }))
    }

    /// Removes exactly `element`, with the same pin rule as [`remove`](Self::remove).
    pub fn remove_element(&self, element: &ElementRef<K, V>, drop_ref: bool) -> Result<Option<V>> {
        let Some(bucket) = self.existing_bucket(element.bucket_index()) else {
            return Ok(None);
        };
        let removed = {
            let mut guard = bucket.lock();
            let removed = guard.remove_element(element, drop_ref)?;
            if let Some(element) = &removed {
                element.mark_evicted();
            }
            removed
        };
        Ok(removed.map(|element| {
            self.counters.lock().object_removed();
            element.value().clone()
        }))
    }

    /// Removes the object under `key` and hands it to the discard strategy.
    ///
    /// The removal stands even when the discard strategy fails; the failure
    /// is reported as [`CacheError::Discard`].
    pub fn remove_and_discard(&self, key: &K, drop_ref: bool) -> Result<Option<V>> {
        let Some(value) = self.remove(key, drop_ref)? else {
            return Ok(None);
        };

        let discard = self.discard_strategy.read().clone();
        if let Some(discard) = discard {
            if let Err(source) = discard.discard_object(self, key, &value) {
                self.counters.lock().record_discard_failure();
                return Err(CacheError::Discard {
                    key: format!("{:?}", key),
                    source,
                });
            }
        }
        Ok(Some(value))
    }

    // == Eviction ==
    /// Returns a fresh weakly consistent enumerator over every element.
    pub fn enumerate_elements(&self) -> CacheElementEnumerator<'_, K, V> {
        CacheElementEnumerator::new(self)
    }

    /// Evicts the object under `key` if the installed eviction strategy still
    /// approves once the bucket is locked.
    ///
    /// Discard failures are logged and counted; the object is gone either
    /// way. A pinned object is never evicted.
    pub fn evict(&self, key: &K) -> bool {
        let Some(strategy) = self.eviction_strategy.read().clone() else {
            return false;
        };
        let Some(bucket) = self.existing_bucket(self.slot_index(key)) else {
            return false;
        };
        let discard = self.discard_strategy.read().clone();

        let mut guard = bucket.lock();
        let Some(candidate) = guard.find_by_key(key) else {
            return false;
        };
        if !strategy.can_be_discarded(self, &candidate) {
            return false;
        }
        let Some(element) = guard.discard_by_key(key) else {
            return false;
        };
        element.mark_evicted();
        let discard_lock = discard.as_ref().and_then(|d| d.discard_lock(key));
        drop(guard);

        {
            let mut counters = self.counters.lock();
            counters.object_removed();
            counters.record_eviction();
        }
        debug!(cache = %self.name, key = ?key, "Object evicted");

        if let Some(discard) = discard {
            if let Err(err) = discard.discard_object(self, element.key(), element.value()) {
                warn!(cache = %self.name, key = ?key, error = %err, "Discard failed during eviction");
                self.counters.lock().record_discard_failure();
            }
        }
        drop(discard_lock);
        true
    }
}

impl<K, V> Drop for ObjectCache<K, V> {
    fn drop(&mut self) {
        if let Some(strategy) = self.eviction_strategy.get_mut().take() {
            strategy.cancel();
        }
    }
}
