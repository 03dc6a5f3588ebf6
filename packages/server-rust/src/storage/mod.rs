//! Storage layers for the employee page cache.
//!
//! - **Engine** ([`CacheEngine`]): byte-valued key-value store with TTL and
//!   atomic conditional writes
//! - **Page cache** ([`PageCache`]): page-level reads and writes plus the
//!   advisory cached-pages index
//! - **Record sources** ([`datastores`]): the ordered employee table the
//!   cache is filled from

pub mod datastores;
pub mod engine;
pub mod engines;
pub mod page_cache;
pub mod record;

pub use engine::*;
pub use page_cache::*;
pub use record::*;
