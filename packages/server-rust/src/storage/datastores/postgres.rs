//! `PostgreSQL` [`RecordSource`] backed by `sqlx`.
//!
//! Reads the `employees` table created by the web application's schema
//! migrations. Ordering is always by primary key so that offset pages are
//! stable while the table only grows.

use async_trait::async_trait;
use empcache_core::{clamp_page_size, page_offset, EmployeeRecord, PageBatch};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::traits::RecordSource;

const SELECT_COLUMNS: &str = "SELECT id, education, joining_year, city, payment_tier, age, \
     gender, ever_benched, experience_in_current_domain, leave_or_not FROM employees";

/// Record source reading from a `PostgreSQL` connection pool.
pub struct PgRecordSource {
    pool: PgPool,
}

impl PgRecordSource {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a small pool to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

fn decode_row(row: &PgRow) -> Result<EmployeeRecord, sqlx::Error> {
    Ok(EmployeeRecord {
        id: row.try_get("id")?,
        education: row.try_get("education")?,
        joining_year: row.try_get("joining_year")?,
        city: row.try_get("city")?,
        payment_tier: row.try_get("payment_tier")?,
        age: row.try_get("age")?,
        gender: row.try_get("gender")?,
        ever_benched: row.try_get("ever_benched")?,
        experience_in_current_domain: row.try_get("experience_in_current_domain")?,
        leave_or_not: row.try_get("leave_or_not")?,
    })
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecordSource for PgRecordSource {
    async fn page_of_records(&self, page: u64, page_size: usize) -> anyhow::Result<PageBatch> {
        let size = clamp_page_size(page_size);
        let sql = format!("{SELECT_COLUMNS} ORDER BY id LIMIT $1 OFFSET $2");
        let rows = sqlx::query(&sql)
            .bind(to_i64(size as u64))
            .bind(to_i64(page_offset(page, size)))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(decode_row).collect::<Result<_, _>>()?)
    }

    async fn count_records(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM employees")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count)?)
    }

    async fn records_after_id(&self, last_id: i64, limit: usize) -> anyhow::Result<PageBatch> {
        let sql = format!("{SELECT_COLUMNS} WHERE id > $1 ORDER BY id LIMIT $2");
        let rows = sqlx::query(&sql)
            .bind(last_id)
            .bind(to_i64(limit as u64))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(decode_row).collect::<Result<_, _>>()?)
    }
}
