use crate::core::Result;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Map of shared entries populated on first reference.
///
/// Lookups take the read lock; insertion takes the write lock and checks
/// again before building, so the builder runs at most once per key even
/// when many threads miss at the same time. Every level of the
/// handler → service → shard → record hierarchy goes through this type.
pub struct LazyMap<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> LazyMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Result<Option<Arc<V>>> {
        Ok(self.entries.read()?.get(key).cloned())
    }

    /// Get the entry or build it; the builder cannot decline.
    pub fn get_or_insert_with<F>(&self, key: K, make: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> V,
    {
        if let Some(found) = self.get(&key)? {
            return Ok(found);
        }

        let mut entries = self.entries.write()?;
        if let Some(found) = entries.get(&key) {
            return Ok(found.clone());
        }

        let created = Arc::new(make());
        entries.insert(key, created.clone());
        Ok(created)
    }

    /// Get the entry or try to build it. `None` from the builder leaves the
    /// map untouched and is passed through to the caller.
    pub fn get_or_try_insert_with<F>(&self, key: K, make: F) -> Result<Option<Arc<V>>>
    where
        F: FnOnce() -> Option<V>,
    {
        if let Some(found) = self.get(&key)? {
            return Ok(Some(found));
        }

        let mut entries = self.entries.write()?;
        if let Some(found) = entries.get(&key) {
            return Ok(Some(found.clone()));
        }

        Ok(make().map(|value| {
            let created = Arc::new(value);
            entries.insert(key, created.clone());
            created
        }))
    }

    /// Copy of the current entries, taken under the read lock.
    pub fn snapshot(&self) -> Result<Vec<(K, Arc<V>)>> {
        Ok(self
            .entries
            .read()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    pub fn keys(&self) -> Result<Vec<K>> {
        Ok(self.entries.read()?.keys().cloned().collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.entries.read()?.contains_key(key))
    }

    pub fn insert(&self, key: K, value: V) -> Result<Arc<V>> {
        let value = Arc::new(value);
        self.entries.write()?.insert(key, value.clone());
        Ok(value)
    }

    pub fn remove(&self, key: &K) -> Result<Option<Arc<V>>> {
        Ok(self.entries.write()?.remove(key))
    }

    /// Shared access that keeps the current entries in place while held.
    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<K, Arc<V>>>> {
        Ok(self.entries.read()?)
    }

    /// Exclusive access for compound structural changes.
    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<K, Arc<V>>>> {
        Ok(self.entries.write()?)
    }
}

impl<K, V> Default for LazyMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
