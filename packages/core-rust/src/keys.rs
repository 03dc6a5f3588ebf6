//! Cache key layout and read-source tags shared by the cache and the web layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of every cached page key.
pub const PAGE_KEY_PREFIX: &str = "employees:page";

/// Key holding the sorted list of page numbers believed to be cached.
pub const CACHED_PAGES_KEY: &str = "employees:cached_pages";

/// Returns the cache key for `page`, e.g. `employees:page:3`.
#[must_use]
pub fn page_key(page: u64) -> String {
    format!("{PAGE_KEY_PREFIX}:{page}")
}

/// Where a served page came from.
///
/// The wire names are the backing technologies the web layer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadSource {
    /// Read from the record store (database).
    #[serde(rename = "postgresql")]
    Store,
    /// Served from the page cache.
    #[serde(rename = "redis")]
    Cache,
}

impl ReadSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Store => "postgresql",
            Self::Cache => "redis",
        }
    }
}

impl fmt::Display for ReadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
