//! Page-level cache over a [`CacheEngine`].
//!
//! [`PageCache`] stores each page of employee records as JSON under
//! `employees:page:<n>` and keeps a side index of cached page numbers under
//! `employees:cached_pages`. The index exists only to make bulk
//! invalidation possible; presence checks always go to the engine.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use empcache_core::{page_key, PageBatch, CACHED_PAGES_KEY};
use tracing::debug;

use super::engine::{CacheEngine, CacheError};

/// Configuration for page cache entries.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Time-to-live applied to page entries and the index. Zero = no expiry.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(600),
        }
    }
}

/// Cache of serialized record pages plus the advisory cached-pages index.
pub struct PageCache {
    engine: Arc<dyn CacheEngine>,
    config: CacheConfig,
}

impl PageCache {
    #[must_use]
    pub fn new(engine: Arc<dyn CacheEngine>, config: CacheConfig) -> Self {
        Self { engine, config }
    }

    /// Access the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &dyn CacheEngine {
        self.engine.as_ref()
    }

    fn ttl(&self) -> Option<Duration> {
        (!self.config.ttl.is_zero()).then_some(self.config.ttl)
    }

    /// Looks up a page. No fallback to the record store.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is unreachable or the cached bytes are
    /// not a valid page.
    pub fn get_page(&self, page: u64) -> Result<Option<PageBatch>, CacheError> {
        let key = page_key(page);
        self.engine
            .get(&key)?
            .map(|bytes| {
                serde_json::from_slice(&bytes).map_err(|source| CacheError::Codec { key, source })
            })
            .transpose()
    }

    /// Checks whether a page is cached without decoding it.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is unreachable.
    pub fn has_page(&self, page: u64) -> Result<bool, CacheError> {
        self.engine.contains(&page_key(page))
    }

    /// Writes a page unconditionally and registers it in the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be encoded or the engine is
    /// unreachable.
    pub fn set_page(&self, page: u64, batch: &PageBatch) -> Result<(), CacheError> {
        let key = page_key(page);
        let bytes = encode(&key, batch)?;
        self.engine.set(&key, bytes, self.ttl())?;
        self.mark_cached(page)
    }

    /// Writes a page only if no live entry exists, then registers it in
    /// the index. Returns whether this call inserted the value.
    ///
    /// The index is updated either way: the page is cached after the call
    /// regardless of which writer landed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be encoded or the engine is
    /// unreachable.
    pub fn add_page_if_absent(&self, page: u64, batch: &PageBatch) -> Result<bool, CacheError> {
        let key = page_key(page);
        let bytes = encode(&key, batch)?;
        let inserted = self.engine.add(&key, bytes, self.ttl())?;
        self.mark_cached(page)?;
        Ok(inserted)
    }

    /// Returns the page numbers listed in the index, ascending.
    ///
    /// The list may name pages whose entries have already expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is unreachable.
    pub fn cached_pages(&self) -> Result<Vec<u64>, CacheError> {
        let current = self.engine.get(CACHED_PAGES_KEY)?;
        Ok(decode_index(current.as_deref()).into_iter().collect())
    }

    /// Deletes every page named in the index, then the index itself.
    ///
    /// Returns the number of page entries that were still present. An
    /// empty or missing index is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is unreachable.
    pub fn clear_all(&self) -> Result<usize, CacheError> {
        let keys: Vec<String> = self.cached_pages()?.into_iter().map(page_key).collect();
        let removed = if keys.is_empty() {
            0
        } else {
            self.engine.delete_many(&keys)?
        };
        self.engine.delete(CACHED_PAGES_KEY)?;
        debug!(listed = keys.len(), removed, "cleared page cache");
        Ok(removed)
    }

    /// Adds `page` to the index in a single atomic engine update.
    ///
    /// The index is rewritten on every call so its TTL never falls behind
    /// the newest page it lists.
    fn mark_cached(&self, page: u64) -> Result<(), CacheError> {
        let mut encode_error = None;
        self.engine
            .update(CACHED_PAGES_KEY, self.ttl(), &mut |current| {
                let mut pages = decode_index(current);
                pages.insert(page);
                match serde_json::to_vec(&pages) {
                    Ok(bytes) => Some(bytes),
                    Err(source) => {
                        encode_error = Some(source);
                        None
                    }
                }
            })?;
        match encode_error {
            Some(source) => Err(CacheError::Codec {
                key: CACHED_PAGES_KEY.to_string(),
                source,
            }),
            None => Ok(()),
        }
    }
}

fn encode(key: &str, batch: &PageBatch) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(batch).map_err(|source| CacheError::Codec {
        key: key.to_string(),
        source,
    })
}

/// Parses the stored index. A missing or unreadable index is treated as empty.
fn decode_index(bytes: Option<&[u8]>) -> BTreeSet<u64> {
    let Some(bytes) = bytes else {
        return BTreeSet::new();
    };
    serde_json::from_slice::<Vec<u64>>(bytes).map_or_else(
        |err| {
            debug!(error = %err, "ignoring unreadable cached-pages index");
            BTreeSet::new()
        },
        |pages| pages.into_iter().collect(),
    )
}
