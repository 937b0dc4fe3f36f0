//! Unique-key bucket backed by a hash map.
//!
//! Used when every key maps to at most one cached value, trading duplicate
//! support for constant-time lookups inside crowded slots.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::bucket::{check_removable, Bucket};
use crate::cache::element::{Element, ElementRef};
use crate::error::{CacheError, Result};

// == Unique Bucket ==
/// Bucket that refuses a second element for a key it already holds.
pub struct UniqueBucket<K, V> {
    index: usize,
    entries: HashMap<K, ElementRef<K, V>>,
}

impl<K, V> UniqueBucket<K, V> {
    /// Creates an empty bucket for slot `index`.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            entries: HashMap::new(),
        }
    }
}

impl<K, V> Bucket<K, V> for UniqueBucket<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync,
    V: Send + Sync,
{
    fn find_by_key(&self, key: &K) -> Option<ElementRef<K, V>> {
        self.entries.get(key).cloned()
    }

    fn insert_by_key(&mut self, key: K, value: V) -> Result<ElementRef<K, V>> {
        if self.entries.contains_key(&key) {
            return Err(CacheError::DuplicateKey(format!("{:?}", key)));
        }
        let element = Arc::new(Element::new(key.clone(), value, self.index));
        self.entries.insert(key, Arc::clone(&element));
        Ok(element)
    }

    fn remove_by_key(&mut self, key: &K, drop_ref: bool) -> Result<Option<ElementRef<K, V>>> {
        if let Some(element) = self.entries.get(key) {
            check_removable(element, drop_ref)?;
        }
        Ok(self.entries.remove(key))
    }

    fn remove_element(
        &mut self,
        element: &ElementRef<K, V>,
        drop_ref: bool,
    ) -> Result<Option<ElementRef<K, V>>> {
        let is_current = self
            .entries
            .get(element.key())
            .is_some_and(|current| Arc::ptr_eq(current, element));
        if !is_current {
            return Ok(None);
        }
        check_removable(element, drop_ref)?;
        Ok(self.entries.remove(element.key()))
    }

    fn discard_by_key(&mut self, key: &K) -> Option<ElementRef<K, V>> {
        if self.entries.get(key)?.pin_count() > 0 {
            return None;
        }
        self.entries.remove(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn copy_into(&self, dest: &mut Vec<ElementRef<K, V>>) {
        dest.extend(self.entries.values().cloned());
    }
}
