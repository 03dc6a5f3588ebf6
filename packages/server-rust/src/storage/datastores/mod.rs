//! `RecordSource` implementations.
//!
//! Provides concrete backends for the [`RecordSource`](crate::traits::RecordSource)
//! trait: [`MemoryRecordSource`] always, and [`PgRecordSource`] with the
//! `postgres` feature.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::{synthetic_record, MemoryRecordSource};
#[cfg(feature = "postgres")]
pub use postgres::PgRecordSource;
