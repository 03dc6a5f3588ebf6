//! In-process [`CacheEngine`] implementation backed by [`DashMap`].
//!
//! Conditional writes go through `DashMap`'s entry API, which holds the
//! shard lock for the duration of the check and the write. Expiry is lazy:
//! an expired entry is treated as absent on access and removed either then
//! or by [`purge_expired`](CacheEngine::purge_expired).

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::storage::engine::{CacheEngine, CacheError};
use crate::storage::record::{now_millis, CacheEntry};

/// In-memory cache engine shared by all request handlers and warmer runs
/// of one process.
pub struct MemoryCacheEngine {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacheEngine {
    /// Creates a new, empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for MemoryCacheEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheEngine for MemoryCacheEngine {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = now_millis();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        self.entries.remove_if(key, |_, e| e.is_expired(now));
        Ok(None)
    }

    fn contains(&self, key: &str) -> Result<bool, CacheError> {
        let now = now_millis();
        Ok(self
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        let entry = CacheEntry::new(value, now_millis(), ttl);
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool, CacheError> {
        let now = now_millis();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(CacheEntry::new(value, now, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, now, ttl));
                Ok(true)
            }
        }
    }

    fn update(
        &self,
        key: &str,
        ttl: Option<Duration>,
        f: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<(), CacheError> {
        let now = now_millis();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = {
                    let current = occupied.get();
                    if current.is_expired(now) {
                        f(None)
                    } else {
                        f(Some(current.value.as_slice()))
                    }
                };
                if let Some(value) = next {
                    occupied.insert(CacheEntry::new(value, now, ttl));
                }
            }
            Entry::Vacant(vacant) => {
                if let Some(value) = f(None) {
                    vacant.insert(CacheEntry::new(value, now, ttl));
                }
            }
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn delete_many(&self, keys: &[String]) -> Result<usize, CacheError> {
        Ok(keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count())
    }

    fn purge_expired(&self) -> usize {
        let now = now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
