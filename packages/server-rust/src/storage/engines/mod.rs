//! `CacheEngine` implementations.
//!
//! Currently includes [`MemoryCacheEngine`], an in-process engine used by
//! the server binary and by tests.

mod memory;

pub use memory::MemoryCacheEngine;
