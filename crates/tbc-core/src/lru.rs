// SPDX-FileCopyrightText: © 2025 TBC Toolkit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Generic bounded LRU cache.
//!
//! Grounded on the same eviction shape as a resource-manager style cache:
//! bound the number of live entries, evict least-recently-used on overflow.
//! Unlike that model this cache is accessed only from a single thread (the
//! field renderer and observation cache both run on the render coordinator's
//! worker thread), so there is no internal locking — recency is tracked with
//! an `IndexMap`, whose iteration/removal order stands in for an intrusive
//! access-order list.

use indexmap::IndexMap;
use std::hash::Hash;

/// A bounded map that evicts the least-recently-used entry when a new key
/// would exceed `capacity`. A `capacity` of zero makes every insert evict
/// immediately (the map never grows past zero resident entries).
pub struct LruCache<K, V> {
    capacity: usize,
    entries: IndexMap<K, V>,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: IndexMap::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Looks up `key`, promoting it to most-recently-used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if self.entries.contains_key(key) {
            self.touch(key);
        }
        self.entries.get(key)
    }

    fn touch(&mut self, key: &K) {
        if let Some(index) = self.entries.get_index_of(key) {
            // Move the touched entry to the back (most-recently-used end).
            if index != self.entries.len() - 1 {
                self.entries.move_index(index, self.entries.len() - 1);
            }
        }
    }

    /// Inserts `value` under `key`, evicting the least-recently-used entry
    /// first if at capacity. Returns the evicted entry, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let mut evicted = None;
        if self.entries.contains_key(&key) {
            self.entries.insert(key.clone(), value);
            self.touch(&key);
            return evicted;
        }
        if self.capacity == 0 {
            return Some((key, value));
        }
        if self.entries.len() >= self.capacity {
            evicted = self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
        evicted
    }

    /// Looks up `key`, promoting it to most-recently-used on a hit. On a
    /// miss, computes the value via `f`, inserts it (evicting the
    /// least-recently-used entry first if at capacity), and returns a
    /// reference to the newly inserted value. A `capacity` of zero still
    /// retains the single value computed here — unlike `insert`'s
    /// immediate-eviction behavior — since a reference to a value that was
    /// never stored cannot be returned.
    pub fn get_or_insert_with(&mut self, key: K, f: impl FnOnce() -> V) -> &V {
        if self.entries.contains_key(&key) {
            self.touch(&key);
        } else {
            if self.entries.len() >= self.capacity.max(1) {
                self.entries.shift_remove_index(0);
            }
            let value = f();
            self.entries.insert(key.clone(), value);
        }
        self.entries.get(&key).expect("key was just inserted or already present")
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_on_overflow() {
        let mut cache: LruCache<u32, &str> = LruCache::new(2);
        cache.insert(1, "a");
        cache.insert(2, "b");
        assert!(cache.get(&1).is_some()); // 1 is now most-recently-used
        cache.insert(3, "c"); // should evict 2, not 1
        assert!(cache.contains_key(&1));
        assert!(!cache.contains_key(&2));
        assert!(cache.contains_key(&3));
    }

    #[test]
    fn capacity_zero_never_retains_entries() {
        let mut cache: LruCache<u32, &str> = LruCache::new(0);
        cache.insert(1, "a");
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache: LruCache<u32, &str> = LruCache::new(4);
        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn get_or_insert_with_computes_only_on_miss() {
        let mut cache: LruCache<u32, &str> = LruCache::new(2);
        let mut calls = 0;
        assert_eq!(*cache.get_or_insert_with(1, || { calls += 1; "a" }), "a");
        assert_eq!(*cache.get_or_insert_with(1, || { calls += 1; "b" }), "a");
        assert_eq!(calls, 1);
    }

    #[test]
    fn reinserting_existing_key_does_not_evict() {
        let mut cache: LruCache<u32, &str> = LruCache::new(2);
        cache.insert(1, "a");
        cache.insert(2, "b");
        cache.insert(1, "a2");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), Some(&"a2"));
    }
}
