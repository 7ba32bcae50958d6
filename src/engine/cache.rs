//! Capacity-bounded maps for the engine's working set and terminal
//! markers. Oldest entries are evicted first once capacity is exceeded,
//! so a long-running watcher holds a stable memory footprint.

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{DateTime, Utc};

struct Slot<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

/// A map that never grows past `capacity` entries.
pub struct BoundedMap<K, V> {
    slots: HashMap<K, Slot<V>>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V> BoundedMap<K, V> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert or replace, evicting the oldest entries when over capacity.
    pub fn insert(&mut self, key: K, value: V) {
        self.slots.insert(
            key,
            Slot {
                value,
                inserted_at: Utc::now(),
            },
        );
        while self.slots.len() > self.capacity {
            let oldest = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.inserted_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    self.slots.remove(&key);
                }
                None => break,
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.slots.get(key).map(|slot| &slot.value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.slots.remove(key).map(|slot| slot.value)
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Iterate over entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.slots.iter().map(|(k, slot)| (k, &slot.value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_when_over_capacity() {
        let mut map = BoundedMap::new(2);
        map.insert("a", 1);
        std::thread::sleep(std::time::Duration::from_millis(2));
        map.insert("b", 2);
        std::thread::sleep(std::time::Duration::from_millis(2));
        map.insert("c", 3);

        assert_eq!(map.len(), 2);
        assert!(!map.contains_key(&"a"));
        assert!(map.contains_key(&"b"));
        assert!(map.contains_key(&"c"));
    }

    #[test]
    fn reinsert_replaces_without_growth() {
        let mut map = BoundedMap::new(2);
        map.insert("a", 1);
        map.insert("a", 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&"a"), Some(&2));
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut map = BoundedMap::new(0);
        map.insert("a", 1);
        assert_eq!(map.len(), 1);
    }
}
