//! Cache Statistics Module
//!
//! Tracks the aggregate object count together with lookup, fault and
//! eviction counters. Lives behind the cache-wide counter lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Aggregate cache counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups that found a cached object
    pub hits: u64,
    /// Lookups that found nothing (before any fault)
    pub misses: u64,
    /// Objects materialized by the fault strategy
    pub faults: u64,
    /// Objects removed by an eviction strategy
    pub evictions: u64,
    /// Discard callbacks that reported an error
    pub discard_failures: u64,
    /// Current number of objects in the cache
    pub total_objects: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub(crate) fn record_fault(&mut self) {
        self.faults += 1;
    }

    pub(crate) fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub(crate) fn record_discard_failure(&mut self) {
        self.discard_failures += 1;
    }

    pub(crate) fn object_added(&mut self) {
        self.total_objects += 1;
    }

    pub(crate) fn object_removed(&mut self) {
        self.total_objects = self.total_objects.saturating_sub(1);
    }
}

// == Lookup Counters ==
/// Hit and miss counters kept outside the counter lock so that lookups on
/// different buckets never contend on it.
#[derive(Debug, Default)]
pub(crate) struct LookupCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LookupCounters {
    pub(crate) fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the current hit and miss counts into `stats`.
    pub(crate) fn fill(&self, stats: &mut CacheStats) {
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.total_objects, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_lookup_counters_fill() {
        let lookups = LookupCounters::default();
        lookups.record(true);
        lookups.record(true);
        lookups.record(false);

        let mut stats = CacheStats::new();
        lookups.fill(&mut stats);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_object_count_never_underflows() {
        let mut stats = CacheStats::new();
        stats.object_added();
        stats.object_removed();
        stats.object_removed();
        assert_eq!(stats.total_objects, 0);
    }
}
