//! In-memory [`RecordSource`] implementation.
//!
//! [`MemoryRecordSource`] keeps the table as a `Vec` sorted by id. It backs
//! the server when no database is configured and every test that needs a
//! record store.

use async_trait::async_trait;
use empcache_core::{clamp_page_size, page_offset, EmployeeRecord, PageBatch};
use parking_lot::RwLock;

use crate::traits::RecordSource;

const EDUCATION: [&str; 3] = ["Bachelors", "Masters", "PHD"];
const CITIES: [&str; 3] = ["Bangalore", "Pune", "New Delhi"];
const GENDERS: [&str; 2] = ["Male", "Female"];

/// Ordered, id-unique record table held in memory.
pub struct MemoryRecordSource {
    records: RwLock<Vec<EmployeeRecord>>,
}

impl MemoryRecordSource {
    /// Creates a source from arbitrary records. Records are sorted by id and
    /// later duplicates of an id are dropped.
    #[must_use]
    pub fn new(mut records: Vec<EmployeeRecord>) -> Self {
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);
        Self {
            records: RwLock::new(records),
        }
    }

    /// Creates a source with `count` synthetic records with ids `1..=count`.
    #[must_use]
    pub fn seeded(count: u64) -> Self {
        Self::new((1..=count).map(synthetic_record).collect())
    }

    /// Appends a record. Ids must keep increasing, mirroring an
    /// auto-increment primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if `record.id` is not greater than the current maximum.
    pub fn append(&self, record: EmployeeRecord) -> anyhow::Result<()> {
        let mut records = self.records.write();
        if let Some(last) = records.last() {
            anyhow::ensure!(
                record.id > last.id,
                "record id {} is not greater than last id {}",
                record.id,
                last.id
            );
        }
        records.push(record);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

/// Deterministic synthetic employee used for seeding demos and tests.
// Seeded ids stay far below i64::MAX and every derived field is a small modulus.
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
#[must_use]
pub fn synthetic_record(id: u64) -> EmployeeRecord {
    let n = id as i64;
    let pick = |len: usize| (id % len as u64) as usize;
    let small = |modulus: i64, base: i64| (base + n % modulus) as i32;
    EmployeeRecord {
        id: n,
        education: EDUCATION[pick(EDUCATION.len())].to_string(),
        joining_year: small(7, 2012),
        city: CITIES[pick(CITIES.len())].to_string(),
        payment_tier: small(3, 1),
        age: small(20, 22),
        gender: GENDERS[pick(GENDERS.len())].to_string(),
        ever_benched: if id % 5 == 0 { "Yes" } else { "No" }.to_string(),
        experience_in_current_domain: small(8, 0),
        leave_or_not: small(2, 0),
    }
}

#[async_trait]
impl RecordSource for MemoryRecordSource {
    async fn page_of_records(&self, page: u64, page_size: usize) -> anyhow::Result<PageBatch> {
        let size = clamp_page_size(page_size);
        let records = self.records.read();
        let offset = usize::try_from(page_offset(page, size)).unwrap_or(usize::MAX);
        Ok(records.iter().skip(offset).take(size).cloned().collect())
    }

    async fn count_records(&self) -> anyhow::Result<u64> {
        Ok(self.records.read().len() as u64)
    }

    async fn records_after_id(&self, last_id: i64, limit: usize) -> anyhow::Result<PageBatch> {
        let records = self.records.read();
        let start = records.partition_point(|r| r.id <= last_id);
        Ok(records[start..].iter().take(limit).cloned().collect())
    }
}
