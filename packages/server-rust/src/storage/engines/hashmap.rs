//! In-memory [`Storage`] implementation backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking. All
//! emulator state lives here; nothing survives a restart.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::storage::engine::{Storage, StoreError};

/// In-memory storage backed by [`DashMap`].
///
/// Reads clone the stored value so no shard guard escapes a call.
#[derive(Debug)]
pub struct HashMapStorage<T> {
    entries: DashMap<String, T>,
}

impl<T> HashMapStorage<T> {
    /// Creates a new, empty `HashMapStorage`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> Default for HashMapStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Storage<T> for HashMapStorage<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn create(&self, key: &str, value: T) -> Result<(), StoreError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists {
                key: key.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    fn get(&self, key: &str) -> Result<T, StoreError> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn put(&self, key: &str, value: T) -> Option<T> {
        self.entries.insert(key.to_string(), value)
    }

    fn update(&self, key: &str, update: &mut dyn FnMut(&mut T)) -> Result<T, StoreError> {
        let mut entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;
        update(entry.value_mut());
        Ok(entry.value().clone())
    }

    fn delete(&self, key: &str) -> Result<T, StoreError> {
        self.entries
            .remove(key)
            .map(|(_, value)| value)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn list(&self) -> Vec<(String, T)> {
        let mut entries: Vec<(String, T)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn create_then_get() {
        let store = HashMapStorage::new();
        store.create("a", 1).unwrap();
        assert_eq!(store.get("a"), Ok(1));
        assert!(store.contains_key("a"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn create_rejects_existing_key() {
        let store = HashMapStorage::new();
        store.create("a", 1).unwrap();
        assert_eq!(
            store.create("a", 2),
            Err(StoreError::AlreadyExists {
                key: "a".to_string()
            })
        );
        assert_eq!(store.get("a"), Ok(1));
    }

    #[test]
    fn missing_keys_are_not_found() {
        let store: HashMapStorage<u32> = HashMapStorage::new();
        let missing = Err(StoreError::NotFound {
            key: "x".to_string(),
        });
        assert_eq!(store.get("x"), missing);
        assert_eq!(store.delete("x"), missing);
        assert_eq!(store.update("x", &mut |v| *v += 1), missing);
    }

    #[test]
    fn put_replaces_and_returns_previous() {
        let store = HashMapStorage::new();
        assert_eq!(store.put("a", 1), None);
        assert_eq!(store.put("a", 2), Some(1));
        assert_eq!(store.get("a"), Ok(2));
    }

    #[test]
    fn update_mutates_in_place() {
        let store = HashMapStorage::new();
        store.create("n", 10).unwrap();
        assert_eq!(store.update("n", &mut |v| *v *= 3), Ok(30));
        assert_eq!(store.get("n"), Ok(30));
    }

    #[test]
    fn delete_and_clear() {
        let store = HashMapStorage::new();
        store.create("a", 1).unwrap();
        store.create("b", 2).unwrap();
        assert_eq!(store.delete("a"), Ok(1));
        assert!(!store.contains_key("a"));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_creates_admit_exactly_one() {
        let store = Arc::new(HashMapStorage::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.create("shared", i).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    proptest! {
        #[test]
        fn list_is_sorted_by_key(keys in proptest::collection::hash_set("[a-z]{1,8}", 0..32)) {
            let store = HashMapStorage::new();
            for key in &keys {
                store.put(key, key.len());
            }
            let listed: Vec<String> = store.list().into_iter().map(|(k, _)| k).collect();
            let mut expected: Vec<String> = keys.into_iter().collect();
            expected.sort();
            prop_assert_eq!(listed, expected);
        }
    }
}
