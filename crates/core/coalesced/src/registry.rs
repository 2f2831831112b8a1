use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Map of keys to the handles currently in flight for them
///
/// Only weak references are held, observers own the handles. An entry
/// whose handle has been dropped counts as absent. Shard locks are held
/// only for the map operation itself.
pub struct Registry<K: Hash + Eq, V> {
    in_flight: DashMap<K, Weak<V>>,
}

impl<K: Hash + Eq + Clone + Debug, V> Registry<K, V> {
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Find the live handle for a key
    pub fn lookup(&self, key: &K) -> Option<Arc<V>> {
        self.in_flight.get(key).and_then(|entry| entry.upgrade())
    }

    /// Register `handle` unless a live handle already exists for `key`
    ///
    /// Returns whichever handle ended up registered, callers must use it
    /// in place of the one they proposed.
    pub fn insert_if_absent(&self, key: K, handle: &Arc<V>) -> Arc<V> {
        match self.in_flight.entry(key) {
            Entry::Occupied(mut entry) => {
                if let Some(existing) = entry.get().upgrade() {
                    existing
                } else {
                    trace!("Replacing dead registry entry for {:?}", entry.key());
                    entry.insert(Arc::downgrade(handle));
                    handle.clone()
                }
            }
            Entry::Vacant(entry) => {
                trace!("Registering {:?}", entry.key());
                entry.insert(Arc::downgrade(handle));
                handle.clone()
            }
        }
    }

    /// Remove whatever is registered for `key`, absent keys are ignored
    pub fn remove(&self, key: &K) {
        self.in_flight.remove(key);
    }

    /// Remove the entry for `key` only if it still points at `handle`
    ///
    /// Returns whether an entry was removed. A handle that has been replaced
    /// by a fresh call for the same key leaves the new entry untouched.
    pub fn remove_handle(&self, key: &K, handle: &V) -> bool {
        let removed = self
            .in_flight
            .remove_if(key, |_, entry| std::ptr::eq(entry.as_ptr(), handle))
            .is_some();

        if removed {
            trace!("Deregistered {key:?}");
        }

        removed
    }

    /// Number of keys with a live handle
    pub fn len(&self) -> usize {
        self.in_flight
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Hash + Eq + Clone + Debug, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
