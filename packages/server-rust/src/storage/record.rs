//! Entry types for the cache storage layer.
//!
//! Defines the unit stored by [`MemoryCacheEngine`](super::engines::MemoryCacheEngine):
//! an opaque serialized value plus the expiry metadata the engine checks on
//! every access.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time as milliseconds since the Unix epoch.
///
/// Millisecond timestamps fit comfortably in i64 until the year 292 million.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Metadata tracked for every cache entry.
#[derive(Debug, Clone, Default)]
pub struct EntryMetadata {
    /// Absolute expiry time in millis since epoch. 0 = never expires.
    pub expiration_time: i64,
}

impl EntryMetadata {
    /// Creates metadata for an entry written at `now` with an optional TTL.
    #[must_use]
    pub fn new(now: i64, ttl: Option<Duration>) -> Self {
        // TTLs are configured in seconds; they never approach i64::MAX millis.
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let expiration_time = ttl
            .filter(|ttl| !ttl.is_zero())
            .map_or(0, |ttl| now.saturating_add(ttl.as_millis() as i64));
        Self { expiration_time }
    }

    /// Returns `true` once `now` has reached the expiry time.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expiration_time > 0 && now >= self.expiration_time
    }
}

/// A cached value together with its expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Serialized payload (JSON bytes for pages and the page index).
    pub value: Vec<u8>,
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    /// Creates an entry written at `now`.
    #[must_use]
    pub fn new(value: Vec<u8>, now: i64, ttl: Option<Duration>) -> Self {
        Self {
            value,
            metadata: EntryMetadata::new(now, ttl),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.metadata.is_expired(now)
    }
}
