use serde::{Deserialize, Serialize};

/// Number of records per page when no explicit size is configured.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Read-only projection of one row of the `employees` table.
///
/// Field names match the JSON projection served to clients and stored in
/// the page cache, so a cached page can be returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    /// Unique, monotonically increasing primary key.
    pub id: i64,
    pub education: String,
    pub joining_year: i32,
    pub city: String,
    pub payment_tier: i32,
    pub age: i32,
    pub gender: String,
    /// `"Yes"` / `"No"` as stored in the source table.
    pub ever_benched: String,
    pub experience_in_current_domain: i32,
    pub leave_or_not: i32,
}

/// One page of records, ordered by ascending `id`.
pub type PageBatch = Vec<EmployeeRecord>;

/// Clamps a page number to the 1-based range.
#[must_use]
pub fn clamp_page(page: u64) -> u64 {
    page.max(1)
}

/// Clamps a page size so that every page holds at least one record.
#[must_use]
pub fn clamp_page_size(page_size: usize) -> usize {
    page_size.max(1)
}

/// Zero-based offset of the first record on `page`.
///
/// Both arguments are clamped first, so `page_offset(0, 0)` is `0`.
#[must_use]
pub fn page_offset(page: u64, page_size: usize) -> u64 {
    (clamp_page(page) - 1).saturating_mul(clamp_page_size(page_size) as u64)
}

/// Page to resume from after `checkpoint` records have been processed.
///
/// Checkpoints count records, not ids: a checkpoint of 2000 with pages of
/// 1000 resumes at page 3.
#[must_use]
pub fn first_page_after(checkpoint: u64, page_size: usize) -> u64 {
    checkpoint / clamp_page_size(page_size) as u64 + 1
}

/// Parses a raw `page` query value the way the listing endpoint expects.
///
/// Missing, non-numeric, zero and negative values all map to page 1.
#[must_use]
pub fn parse_page(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .map_or(1, |p| u64::try_from(p).map_or(1, clamp_page))
}
