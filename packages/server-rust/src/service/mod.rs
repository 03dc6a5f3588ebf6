//! Cache warming and read services.
//!
//! 1. **Warmer** (`warmer`): resumable page-by-page cache refresh
//! 2. **Read path** (`read_path`): cache-first page reads with store fallback
//! 3. **Resume** (`resume`): re-queues interrupted runs, once at startup
//! 4. **Background workers** (`worker`): the refresh scheduler

pub mod config;
pub mod read_path;
pub mod resume;
pub mod warmer;
pub mod worker;

// Re-export key types for convenient access.
pub use config::{WarmerConfig, REFRESH_JOB_NAME};
pub use read_path::{PageListing, ReadPath};
pub use resume::{ResumeTrigger, StartupHook};
pub use warmer::{CacheWarmer, RefreshOutcome, WarmerError};
pub use worker::{BackgroundRunnable, BackgroundWorker, TaskSender, WarmerRunnable, WarmerTask};
