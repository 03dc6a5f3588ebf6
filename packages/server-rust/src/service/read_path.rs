//! Cache-first page reads.
//!
//! A hit is served from the page cache. A miss reads the record store and
//! writes the page back. A cache outage never fails a read.

use std::sync::Arc;

use empcache_core::{clamp_page, clamp_page_size, page_offset, parse_page, PageBatch, ReadSource};
use metrics::counter;
use serde::Serialize;
use tracing::warn;

use crate::storage::PageCache;
use crate::traits::RecordSource;

/// One page of the employee list plus its pagination context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageListing {
    pub employees: PageBatch,
    pub source: ReadSource,
    pub count: u64,
    pub page: u64,
    pub page_size: usize,
    /// 1-based index of the first record on the page, 0 for an empty table.
    pub range_start: u64,
    /// 1-based index of the last record on the page, 0 for an empty table.
    pub range_end: u64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_page: u64,
    pub next_page: u64,
}

/// Serves employee pages, preferring the cache over the record store.
pub struct ReadPath {
    source: Arc<dyn RecordSource>,
    cache: Arc<PageCache>,
    page_size: usize,
}

impl ReadPath {
    #[must_use]
    pub fn new(source: Arc<dyn RecordSource>, cache: Arc<PageCache>, page_size: usize) -> Self {
        Self {
            source,
            cache,
            page_size: clamp_page_size(page_size),
        }
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Returns the requested page and where it came from.
    ///
    /// `page` and `page_size` are clamped to at least 1.
    ///
    /// # Errors
    ///
    /// Returns an error only if the record store read fails.
    pub async fn serve_page(
        &self,
        page: u64,
        page_size: usize,
    ) -> anyhow::Result<(PageBatch, ReadSource)> {
        let page = clamp_page(page);
        let page_size = clamp_page_size(page_size);

        match self.cache.get_page(page) {
            Ok(Some(batch)) => {
                counter!("empcache_read_total", "source" => ReadSource::Cache.as_str()).increment(1);
                return Ok((batch, ReadSource::Cache));
            }
            Ok(None) => {}
            Err(e) => warn!(page, error = %e, "page cache lookup failed, reading store"),
        }

        let batch = self.source.page_of_records(page, page_size).await?;
        if let Err(e) = self.cache.set_page(page, &batch) {
            warn!(page, error = %e, "page cache write failed");
        }
        counter!("empcache_read_total", "source" => ReadSource::Store.as_str()).increment(1);
        Ok((batch, ReadSource::Store))
    }

    /// Builds the list view for a raw `page` query value.
    ///
    /// Missing, non-numeric or non-positive values select page 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store cannot be read or counted.
    pub async fn list_page(&self, raw_page: Option<&str>) -> anyhow::Result<PageListing> {
        let page = parse_page(raw_page);
        let page_size = self.page_size;
        let (employees, source) = self.serve_page(page, page_size).await?;
        let count = self.source.count_records().await?;

        let size = page_size as u64;
        let (range_start, range_end) = if count > 0 {
            (
                page_offset(page, page_size).saturating_add(1),
                page.saturating_mul(size).min(count),
            )
        } else {
            (0, 0)
        };

        Ok(PageListing {
            employees,
            source,
            count,
            page,
            page_size,
            range_start,
            range_end,
            has_prev: page > 1,
            has_next: page.saturating_mul(size) < count,
            prev_page: page - 1,
            next_page: page.saturating_add(1),
        })
    }
}
