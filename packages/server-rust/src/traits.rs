use async_trait::async_trait;
use empcache_core::PageBatch;

use crate::service::WarmerTask;

/// Read-only access to the ordered employee table.
/// Implementations: `PostgreSQL` (`postgres` feature), memory (default, tests).
///
/// Records are always returned in ascending `id` order.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Load the 1-based `page` of `page_size` records.
    ///
    /// Both arguments are clamped to at least 1. A page past the end is empty.
    async fn page_of_records(&self, page: u64, page_size: usize) -> anyhow::Result<PageBatch>;

    /// Total number of records.
    async fn count_records(&self) -> anyhow::Result<u64>;

    /// Load up to `limit` records with `id > last_id`.
    async fn records_after_id(&self, last_id: i64, limit: usize) -> anyhow::Result<PageBatch>;
}

/// Hands warmer tasks to whatever runs them (the background scheduler in
/// production, a recorder in tests).
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a task without waiting for it to run.
    async fn enqueue(&self, task: WarmerTask) -> anyhow::Result<()>;
}
