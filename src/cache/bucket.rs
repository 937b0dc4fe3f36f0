//! Bucket Module
//!
//! Unsynchronized per-slot collections of elements. The owning
//! [`ObjectCache`](crate::cache::ObjectCache) wraps every bucket in its own
//! lock; nothing in here may be touched without holding it.

use std::fmt;
use std::sync::Arc;

use crate::cache::element::{Element, ElementRef};
use crate::error::{CacheError, Result};

/// Smallest backing array an [`ArrayBucket`] allocates.
const MIN_CAPACITY: usize = 4;

// == Bucket Trait ==
/// An unordered multi-collection of elements for one hash slot.
///
/// Lookups return the most recently inserted match, so repeated lookups for
/// the same key are stable as long as nothing is written in between.
pub trait Bucket<K, V>: Send {
    /// Returns the most recently inserted element for `key`.
    fn find_by_key(&self, key: &K) -> Option<ElementRef<K, V>>;

    /// Adds a new unpinned element for `key`.
    fn insert_by_key(&mut self, key: K, value: V) -> Result<ElementRef<K, V>>;

    /// Removes the element `find_by_key` would return.
    ///
    /// Fails with [`CacheError::PinConflict`] when a pin other than the
    /// caller's own (counted only when `drop_ref` is set) is outstanding.
    fn remove_by_key(&mut self, key: &K, drop_ref: bool) -> Result<Option<ElementRef<K, V>>>;

    /// Removes exactly `element`, with the same pin rule as `remove_by_key`.
    fn remove_element(
        &mut self,
        element: &ElementRef<K, V>,
        drop_ref: bool,
    ) -> Result<Option<ElementRef<K, V>>>;

    /// Removes the element for `key` only if it is not pinned at all.
    fn discard_by_key(&mut self, key: &K) -> Option<ElementRef<K, V>>;

    /// Number of elements held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a snapshot of every element to `dest`.
    fn copy_into(&self, dest: &mut Vec<ElementRef<K, V>>);
}

/// Checks the pin rule shared by every removal path.
pub(crate) fn check_removable<K: fmt::Debug, V>(
    element: &Element<K, V>,
    drop_ref: bool,
) -> Result<()> {
    let allowed = i32::from(drop_ref);
    let pin_count = element.pin_count();
    if pin_count > allowed {
        return Err(CacheError::PinConflict {
            key: format!("{:?}", element.key()),
            pin_count,
        });
    }
    Ok(())
}

// == Array Bucket ==
/// General bucket backed by a growable array with head and tail cursors.
///
/// Duplicate keys are allowed. Removal at either end is O(1); interior
/// removal shifts whichever side needs fewer moves. When the tail runs off
/// the end the array is compacted if more than half of it sits unused before
/// the head, otherwise it grows by half.
pub struct ArrayBucket<K, V> {
    index: usize,
    slots: Vec<Option<ElementRef<K, V>>>,
    head: usize,
    tail: usize,
}

impl<K, V> ArrayBucket<K, V> {
    /// Creates an empty bucket for slot `index`.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            slots: Vec::new(),
            head: 0,
            tail: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn live(&self) -> impl DoubleEndedIterator<Item = (usize, &ElementRef<K, V>)> {
        (self.head..self.tail).filter_map(move |i| self.slots[i].as_ref().map(|e| (i, e)))
    }

    fn push(&mut self, element: ElementRef<K, V>) {
        if self.tail == self.slots.len() {
            self.make_room();
        }
        self.slots[self.tail] = Some(element);
        self.tail += 1;
    }

    fn make_room(&mut self) {
        let capacity = self.slots.len();
        if self.head > capacity / 2 {
            let len = self.tail - self.head;
            self.slots.rotate_left(self.head);
            self.head = 0;
            self.tail = len;
        } else {
            let grown = (capacity + capacity / 2).max(MIN_CAPACITY);
            self.slots.resize_with(grown, || None);
        }
    }

    fn take_at(&mut self, i: usize) -> Option<ElementRef<K, V>> {
        let element = self.slots[i].take();
        if i - self.head < self.tail - 1 - i {
            self.slots[self.head..=i].rotate_right(1);
            self.head += 1;
        } else {
            self.slots[i..self.tail].rotate_left(1);
            self.tail -= 1;
        }
        if self.head == self.tail {
            self.head = 0;
            self.tail = 0;
        }
        element
    }
}

impl<K: Eq, V> ArrayBucket<K, V> {
    fn position(&self, key: &K) -> Option<usize> {
        self.live()
            .rev()
            .find(|(_, element)| element.key() == key)
            .map(|(i, _)| i)
    }
}

impl<K, V> Bucket<K, V> for ArrayBucket<K, V>
where
    K: Eq + fmt::Debug + Send + Sync,
    V: Send + Sync,
{
    fn find_by_key(&self, key: &K) -> Option<ElementRef<K, V>> {
        self.position(key).and_then(|i| self.slots[i].clone())
    }

    fn insert_by_key(&mut self, key: K, value: V) -> Result<ElementRef<K, V>> {
        let element = Arc::new(Element::new(key, value, self.index));
        self.push(Arc::clone(&element));
        Ok(element)
    }

    fn remove_by_key(&mut self, key: &K, drop_ref: bool) -> Result<Option<ElementRef<K, V>>> {
        let Some(i) = self.position(key) else {
            return Ok(None);
        };
        if let Some(element) = &self.slots[i] {
            check_removable(element, drop_ref)?;
        }
        Ok(self.take_at(i))
    }

    fn remove_element(
        &mut self,
        element: &ElementRef<K, V>,
        drop_ref: bool,
    ) -> Result<Option<ElementRef<K, V>>> {
        let found = self
            .live()
            .rev()
            .find(|(_, candidate)| Arc::ptr_eq(candidate, element))
            .map(|(i, _)| i);
        let Some(i) = found else {
            return Ok(None);
        };
        check_removable(element, drop_ref)?;
        Ok(self.take_at(i))
    }

    fn discard_by_key(&mut self, key: &K) -> Option<ElementRef<K, V>> {
        let i = self.position(key)?;
        let pinned = self.slots[i]
            .as_ref()
            .is_some_and(|element| element.pin_count() > 0);
        if pinned {
            return None;
        }
        self.take_at(i)
    }

    fn len(&self) -> usize {
        self.tail - self.head
    }

    fn copy_into(&self, dest: &mut Vec<ElementRef<K, V>>) {
        dest.extend(self.live().map(|(_, element)| Arc::clone(element)));
    }
}
