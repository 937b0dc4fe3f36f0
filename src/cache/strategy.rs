//! Collaborator Traits
//!
//! The cache delegates value materialization, cleanup of departing objects
//! and victim selection to these strategies.

use std::any::Any;

use crate::cache::element::Element;
use crate::cache::store::ObjectCache;

/// Guard held across an eviction's discard callback. Dropping it releases
/// whatever external per-key lock it represents.
pub type DiscardLock = Box<dyn Any>;

// == Fault Strategy ==
/// Materializes a value on a cache miss.
///
/// Invoked by [`ObjectCache::find_or_fault`] while the bucket for `key` is
/// locked, so it must not call back into the cache for keys that share
/// that bucket.
pub trait FaultStrategy<K, V>: Send + Sync {
    fn fault_on_key(&self, cache: &ObjectCache<K, V>, key: &K) -> anyhow::Result<Option<V>>;
}

impl<K, V, F> FaultStrategy<K, V> for F
where
    F: Fn(&K) -> anyhow::Result<Option<V>> + Send + Sync,
{
    fn fault_on_key(&self, _cache: &ObjectCache<K, V>, key: &K) -> anyhow::Result<Option<V>> {
        self(key)
    }
}

// == Discard Strategy ==
/// Notified after an object has left the cache through eviction or
/// [`ObjectCache::remove_and_discard`].
pub trait DiscardStrategy<K, V>: Send + Sync {
    fn discard_object(&self, cache: &ObjectCache<K, V>, key: &K, value: &V) -> anyhow::Result<()>;

    /// Returns a lock that eviction must hold while `discard_object` runs.
    ///
    /// Acquired while the bucket is still locked, released after the
    /// callback returns.
    fn discard_lock(&self, _key: &K) -> Option<DiscardLock> {
        None
    }
}

impl<K, V, F> DiscardStrategy<K, V> for F
where
    F: Fn(&K, &V) -> anyhow::Result<()> + Send + Sync,
{
    fn discard_object(&self, _cache: &ObjectCache<K, V>, key: &K, value: &V) -> anyhow::Result<()> {
        self(key, value)
    }
}

// == Eviction Strategy ==
/// Decides which elements may leave the cache.
pub trait EvictionStrategy<K, V>: Send + Sync {
    /// Returns true if `element` may be evicted right now.
    ///
    /// [`ObjectCache::evict`] asks again with the bucket locked before
    /// removing anything.
    fn can_be_discarded(&self, cache: &ObjectCache<K, V>, element: &Element<K, V>) -> bool;

    /// Stops all future scheduling. Must be idempotent.
    fn cancel(&self);
}
