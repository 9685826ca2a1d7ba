//! A simple LRU cache memoizing a pure function `K -> V`.
//!
//! The capacity is fixed at construction; a lookup miss evaluates the
//! function and, when the cache is full, evicts the least recently used
//! entry first. The cache is single-threaded; callers synchronize
//! externally.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// LRU cache around a pure function.
pub struct LruCache<K, V, F>
where
    K: Eq + Hash + Clone,
    V: Clone,
    F: Fn(&K) -> V,
{
    function: F,
    capacity: usize,
    /// Access history, most recent at the back
    tracker: VecDeque<K>,
    values: HashMap<K, V>,
}

impl<K, V, F> LruCache<K, V, F>
where
    K: Eq + Hash + Clone,
    V: Clone,
    F: Fn(&K) -> V,
{
    /// Wrap `function` with a cache of `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics when `capacity` is zero.
    pub fn new(function: F, capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            function,
            capacity,
            tracker: VecDeque::with_capacity(capacity),
            values: HashMap::with_capacity(capacity),
        }
    }

    /// Cached value of the function at `key`, computing it on a miss.
    pub fn get(&mut self, key: &K) -> V {
        if let Some(value) = self.values.get(key) {
            let value = value.clone();
            self.touch(key);
            return value;
        }

        if self.values.len() == self.capacity {
            self.evict();
        }
        let value = (self.function)(key);
        self.tracker.push_back(key.clone());
        self.values.insert(key.clone(), value.clone());
        value
    }

    /// Move `key` to the most-recently-used end.
    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.tracker.iter().position(|k| k == key) {
            self.tracker.remove(pos);
            self.tracker.push_back(key.clone());
        }
    }

    /// Drop the least-recently-used entry.
    fn evict(&mut self) {
        if let Some(key) = self.tracker.pop_front() {
            self.values.remove(&key);
        }
    }

    /// Clear the cache.
    pub fn invalidate(&mut self) {
        self.tracker.clear();
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn invert(s: &String) -> String {
        s.chars().rev().collect()
    }

    #[test]
    fn test_eviction_order() {
        let evaluations = Cell::new(0usize);
        let mut lru = LruCache::new(
            |k: &String| {
                evaluations.set(evaluations.get() + 1);
                invert(k)
            },
            5,
        );
        // prime the cache
        assert_eq!(lru.get(&"first".to_string()), "tsrif");
        assert_eq!(lru.get(&"second".to_string()), "dnoces");
        assert_eq!(lru.get(&"third".to_string()), "driht");
        assert_eq!(lru.get(&"fourth".to_string()), "htruof");
        assert_eq!(lru.get(&"fifth".to_string()), "htfif");
        assert_eq!(evaluations.get(), 5);
        // sixth evicts first
        assert_eq!(lru.get(&"sixth".to_string()), "htxis");
        assert_eq!(evaluations.get(), 6);

        // cache: second third fourth fifth sixth
        assert_eq!(lru.get(&"second".to_string()), "dnoces");
        assert_eq!(evaluations.get(), 6);

        // cache: third fourth fifth sixth second; first was evicted
        assert_eq!(lru.get(&"first".to_string()), "tsrif");
        assert_eq!(evaluations.get(), 7);

        // cache: fourth fifth sixth second first
        assert_eq!(lru.get(&"fourth".to_string()), "htruof");
        assert_eq!(evaluations.get(), 7);

        // cache: fifth sixth second first fourth; seventh evicts fifth
        assert_eq!(lru.get(&"seventh".to_string()), "htneves");
        assert_eq!(evaluations.get(), 8);

        assert_eq!(lru.get(&"fifth".to_string()), "htfif");
        assert_eq!(evaluations.get(), 9);
    }

    #[test]
    fn test_invalidate_clears_everything() {
        let evaluations = Cell::new(0usize);
        let mut lru = LruCache::new(
            |k: &u32| {
                evaluations.set(evaluations.get() + 1);
                k * 2
            },
            3,
        );
        assert_eq!(lru.get(&21), 42);
        assert_eq!(lru.get(&21), 42);
        assert_eq!(evaluations.get(), 1);
        assert_eq!(lru.len(), 1);

        lru.invalidate();
        assert!(lru.is_empty());
        assert_eq!(lru.get(&21), 42);
        assert_eq!(evaluations.get(), 2);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_panics() {
        let _ = LruCache::new(|k: &u32| *k, 0);
    }

    #[test]
    fn test_capacity_one_always_evicts() {
        let evaluations = Cell::new(0usize);
        let mut lru = LruCache::new(
            |k: &u32| {
                evaluations.set(evaluations.get() + 1);
                k + 1
            },
            1,
        );
        assert_eq!(lru.get(&1), 2);
        assert_eq!(lru.get(&1), 2);
        assert_eq!(evaluations.get(), 1);
        assert_eq!(lru.get(&2), 3);
        assert_eq!(lru.get(&1), 2);
        assert_eq!(evaluations.get(), 3);
        assert_eq!(lru.len(), 1);
    }
}
