//! Low-level cache engine trait.
//!
//! Defines [`CacheEngine`], the innermost storage layer under the page
//! cache. An engine is a flat byte-valued key-value store with per-entry
//! TTL and an atomic set-if-absent, the same primitive set a Redis-backed
//! cache exposes.

use std::time::Duration;

/// Errors surfaced by the cache layer.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode or decode cache entry {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Byte-valued key-value store with TTL and atomic conditional writes.
///
/// All operations are synchronous and short. Implementations must make
/// [`add`](CacheEngine::add) and [`update`](CacheEngine::update) atomic with
/// respect to concurrent callers on the same key; a separate read followed
/// by a write does not satisfy the contract.
///
/// Expired entries behave exactly like absent ones.
///
/// Wrapped in `Arc<dyn CacheEngine>` for sharing across async boundaries.
pub trait CacheEngine: Send + Sync + 'static {
    /// Retrieve a live value by key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Check whether a live value exists without copying it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn contains(&self, key: &str) -> Result<bool, CacheError>;

    /// Insert or replace a value. `None` or a zero TTL never expires.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Insert only if no live value exists. Returns whether the insert happened.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn add(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool, CacheError>;

    /// Atomically replace the value under `key` with `f(current)`.
    ///
    /// `current` is `None` when the key is absent or expired. Returning
    /// `None` from `f` leaves the entry untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn update(
        &self,
        key: &str,
        ttl: Option<Duration>,
        f: &mut dyn FnMut(Option<&[u8]>) -> Option<Vec<u8>>,
    ) -> Result<(), CacheError>;

    /// Remove a key. Removing an absent or expired key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove every listed key, returning how many were present.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend cannot be reached.
    fn delete_many(&self, keys: &[String]) -> Result<usize, CacheError>;

    /// Drop entries whose TTL has elapsed. Returns the number removed.
    ///
    /// Engines that expire entries on their own may keep the default no-op.
    fn purge_expired(&self) -> usize {
        0
    }

    /// Number of stored entries, including any not yet purged.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
