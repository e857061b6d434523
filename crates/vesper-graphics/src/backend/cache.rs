//! Memoization of backend objects keyed by their configuration.
//!
//! Used for pipelines, render passes and framebuffers. Entries record
//! whether they were used during the current frame; [`ObjectCache::sweep`]
//! evicts the ones left untouched for too many frames.

use std::collections::hash_map::Entry;
use std::hash::Hash;

use vesper_core::alloc::HashMap;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    used: bool,
    unused_frames: u32,
}

#[derive(Debug)]
pub struct ObjectCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

impl<K: Eq + Hash, V> Default for ObjectCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> ObjectCache<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Looks up `key`, creating the value on a miss. Failed creation caches nothing.
    pub fn get_or_try_insert_with<E>(&mut self, key: K, create: impl FnOnce(&K) -> Result<V, E>) -> Result<&V, E> {
        let entry = match self.entries.entry(key) {
            Entry::Occupied(occupied) => {
                self.hits += 1;
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => {
                self.misses += 1;
                let value = create(vacant.key())?;
                vacant.insert(CacheEntry {
                    value,
                    used: false,
                    unused_frames: 0,
                })
            }
        };
        entry.used = true;
        Ok(&entry.value)
    }

    pub fn get_or_insert_with(&mut self, key: K, create: impl FnOnce(&K) -> V) -> &V {
        match self.get_or_try_insert_with(key, |k| Ok::<V, std::convert::Infallible>(create(k))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Ends a frame: ages entries not used since the last sweep and returns
    /// the values idle for more than `max_unused_frames`.
    pub fn sweep(&mut self, max_unused_frames: u32) -> Vec<V> {
        for entry in self.entries.values_mut() {
            if entry.used {
                entry.used = false;
                entry.unused_frames = 0;
            } else {
                entry.unused_frames += 1;
            }
        }
        self.remove_where(|_, entry| entry.unused_frames > max_unused_frames)
    }

    /// Drops every entry for which `keep` returns false and returns their values.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) -> Vec<V> {
        self.remove_where(|key, entry| !keep(key, &entry.value))
    }

    pub fn clear(&mut self) -> Vec<V> {
        self.entries.drain().map(|(_, entry)| entry.value).collect()
    }

    fn remove_where(&mut self, mut remove: impl FnMut(&K, &CacheEntry<V>) -> bool) -> Vec<V> {
        if !self.entries.iter().any(|(key, entry)| remove(key, entry)) {
            return Vec::new();
        }
        let mut removed = Vec::new();
        for (key, entry) in std::mem::take(&mut self.entries) {
            if remove(&key, &entry) {
                removed.push(entry.value);
            } else {
                self.entries.insert(key, entry);
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let mut cache: ObjectCache<u32, String> = ObjectCache::new();
        let mut created = 0;
        for _ in 0..3 {
            cache.get_or_insert_with(7, |k| {
                created += 1;
                format!("pipeline {k}")
            });
        }
        assert_eq!(created, 1);
        assert_eq!(cache.stats(), (2, 1));
        assert_eq!(cache.get_or_insert_with(7, |_| unreachable!()), "pipeline 7");
    }

    #[test]
    fn test_failed_create_is_not_cached() {
        let mut cache: ObjectCache<u32, u32> = ObjectCache::new();
        assert!(cache.get_or_try_insert_with(1, |_| Err("no")).is_err());
        assert!(cache.is_empty());
        assert_eq!(*cache.get_or_try_insert_with(1, |_| Ok::<_, ()>(5)).unwrap(), 5);
    }

    #[test]
    fn test_sweep_evicts_idle_entries() {
        let mut cache: ObjectCache<&str, u32> = ObjectCache::new();
        cache.get_or_insert_with("a", |_| 1);
        cache.get_or_insert_with("b", |_| 2);

        for _ in 0..3 {
            assert!(cache.sweep(2).is_empty());
            cache.get_or_insert_with("a", |_| 1);
        }
        assert_eq!(cache.sweep(2), vec![2]);
        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
    }

    #[test]
    fn test_sweep_threshold() {
        let mut cache: ObjectCache<u8, u8> = ObjectCache::new();
        cache.get_or_insert_with(0, |_| 9);
        assert!(cache.sweep(1).is_empty()); // used this frame
        assert!(cache.sweep(1).is_empty()); // idle 1
        assert_eq!(cache.sweep(1), vec![9]); // idle 2
        assert!(cache.is_empty());
    }

    #[test]
    fn test_retain_returns_removed() {
        let mut cache: ObjectCache<u32, u32> = ObjectCache::new();
        for i in 0..4 {
            cache.get_or_insert_with(i, |k| k * 10);
        }
        let mut removed = cache.retain(|k, _| k % 2 == 0);
        removed.sort();
        assert_eq!(removed, vec![10, 30]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.clear().len(), 2);
    }
}
