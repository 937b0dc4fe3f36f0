//! Cache Element Enumerator
//!
//! Weakly consistent traversal used by eviction sweeps. Each bucket is
//! copied into a private buffer while its lock is held, then iterated with
//! no lock at all.

use std::fmt;
use std::hash::Hash;

use rand::Rng;

use crate::cache::element::ElementRef;
use crate::cache::store::ObjectCache;

// == Enumerator ==
/// Restartable, weakly consistent sequence over every element in a cache.
///
/// Elements present for the whole pass are produced exactly once. Elements
/// added or removed during the pass may or may not appear, and a buffered
/// element removed after its bucket was copied is still produced; callers
/// revalidate before acting on it.
pub struct CacheElementEnumerator<'a, K, V> {
    cache: &'a ObjectCache<K, V>,
    start: usize,
    visited: usize,
    buffer: Vec<ElementRef<K, V>>,
    cursor: usize,
}

impl<'a, K, V> CacheElementEnumerator<'a, K, V>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(cache: &'a ObjectCache<K, V>) -> Self {
        let mut enumerator = Self {
            cache,
            start: 0,
            visited: 0,
            buffer: Vec::new(),
            cursor: 0,
        };
        enumerator.reset();
        enumerator
    }

    /// Restarts at a random bucket and releases the buffered snapshot.
    pub fn reset(&mut self) {
        self.start = rand::thread_rng().gen_range(0..self.cache.bucket_count());
        self.visited = 0;
        self.buffer = Vec::new();
        self.cursor = 0;
    }

    /// Returns true if another element is available, copying the next
    /// non-empty bucket if the current snapshot is exhausted.
    pub fn has_next(&mut self) -> bool {
        let bucket_count = self.cache.bucket_count();
        while self.cursor >= self.buffer.len() {
            if self.visited >= bucket_count {
                return false;
            }
            let index = (self.start + self.visited) % bucket_count;
            self.visited += 1;
            self.buffer.clear();
            self.cursor = 0;
            self.cache.copy_bucket(index, &mut self.buffer);
        }
        true
    }

    /// Returns the next element, or `None` once every bucket was visited.
    pub fn next_element(&mut self) -> Option<ElementRef<K, V>> {
        if !self.has_next() {
            return None;
        }
        let element = self.buffer[self.cursor].clone();
        self.cursor += 1;
        Some(element)
    }
}

impl<K, V> Iterator for CacheElementEnumerator<'_, K, V>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Item = ElementRef<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_element()
    }
}
