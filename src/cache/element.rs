//! Cache Element Module
//!
//! Defines the holder for one cached key/value pair together with the
//! cache-private metadata used for pinning and sweep aging.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;

/// Pin count written into an element once it has left the cache.
pub(crate) const EVICTED_PIN_COUNT: i32 = i32::MIN;

/// Shared handle to an element living in an [`ObjectCache`](crate::cache::ObjectCache).
pub type ElementRef<K, V> = Arc<Element<K, V>>;

// == Element ==
/// One cached key/value pair plus its pin count, last-touched sweep tick and
/// eviction eligibility.
///
/// Metadata is stored in atomics so that sweeps can read it without taking
/// the bucket lock. Writes only happen while the owning bucket is locked.
pub struct Element<K, V> {
    key: K,
    value: V,
    pin_count: AtomicI32,
    last_touched: AtomicU64,
    ineligible: AtomicBool,
    /// Index of the bucket holding this element
    bucket: usize,
}

impl<K, V> Element<K, V> {
    // == Constructor ==
    /// Creates an unpinned element owned by bucket `bucket`.
    pub(crate) fn new(key: K, value: V, bucket: usize) -> Self {
        Self {
            key,
            value,
            pin_count: AtomicI32::new(0),
            last_touched: AtomicU64::new(0),
            ineligible: AtomicBool::new(false),
            bucket,
        }
    }

    /// The key this element was inserted under.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The cached value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Current pin count. Negative once the element has been evicted.
    pub fn pin_count(&self) -> i32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Returns true if at least one pin is outstanding.
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    /// Returns true once the element has been removed or evicted.
    pub fn is_evicted(&self) -> bool {
        self.pin_count() == EVICTED_PIN_COUNT
    }

    /// Returns true if the element was excluded from eviction.
    pub fn is_ineligible_for_eviction(&self) -> bool {
        self.ineligible.load(Ordering::Acquire)
    }

    pub(crate) fn bucket_index(&self) -> usize {
        self.bucket
    }

    pub(crate) fn last_touched(&self) -> u64 {
        self.last_touched.load(Ordering::Relaxed)
    }

    pub(crate) fn touch(&self, tick: u64) {
        self.last_touched.store(tick, Ordering::Relaxed);
    }

    /// Adds `delta` to the pin count and returns the new count.
    pub(crate) fn adjust_pins(&self, delta: i32) -> i32 {
        self.pin_count.fetch_add(delta, Ordering::AcqRel) + delta
    }

    pub(crate) fn mark_ineligible(&self) {
        self.ineligible.store(true, Ordering::Release);
    }

    pub(crate) fn mark_evicted(&self) {
        self.pin_count.store(EVICTED_PIN_COUNT, Ordering::Release);
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Element<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("key", &self.key)
            .field("pin_count", &self.pin_count())
            .field("last_touched", &self.last_touched())
            .field("ineligible", &self.is_ineligible_for_eviction())
            .field("bucket", &self.bucket)
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_starts_unpinned() {
        let element = Element::new("key", 7, 3);

        assert_eq!(*element.key(), "key");
        assert_eq!(*element.value(), 7);
        assert_eq!(element.pin_count(), 0);
        assert!(!element.is_pinned());
        assert!(!element.is_evicted());
        assert!(!element.is_ineligible_for_eviction());
        assert_eq!(element.bucket_index(), 3);
    }

    #[test]
    fn test_adjust_pins_returns_new_count() {
        let element = Element::new(1u32, (), 0);

        assert_eq!(element.adjust_pins(1), 1);
        assert_eq!(element.adjust_pins(2), 3);
        assert_eq!(element.adjust_pins(-3), 0);
    }

    #[test]
    fn test_mark_evicted_uses_sentinel() {
        let element = Element::new(1u32, (), 0);
        element.adjust_pins(1);
        element.mark_evicted();

        assert!(element.is_evicted());
        assert!(!element.is_pinned());
    }

    #[test]
    fn test_touch_records_tick() {
        let element = Element::new(1u32, (), 0);
        element.touch(42);
        assert_eq!(element.last_touched(), 42);
    }
}
