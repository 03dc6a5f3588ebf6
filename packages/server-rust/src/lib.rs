//! `empcache` server: resumable cache warmer, cache-first read path, and the
//! HTTP surface in front of them.

pub mod config;
pub mod network;
pub mod progress;
pub mod service;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod testutil;

pub use config::AppConfig;
pub use progress::{ProgressLog, ProgressLogError};
pub use service::{CacheWarmer, ReadPath, WarmerConfig, WarmerTask};
pub use storage::{CacheConfig, CacheEngine, CacheError, PageCache};
pub use traits::{JobQueue, RecordSource};
