//! HTTP handler definitions for the `empcache` server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod employees;
pub mod error;
pub mod health;
pub mod jobs;

pub use employees::employees_handler;
pub use error::ApiError;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use jobs::{clear_cache_handler, job_status_handler, refresh_handler};

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::progress::ProgressLog;
use crate::service::ReadPath;
use crate::storage::PageCache;
use crate::traits::JobQueue;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Cache-first employee page reads.
    pub read_path: Arc<ReadPath>,
    /// Queue feeding the cache warmer scheduler.
    pub jobs: Arc<dyn JobQueue>,
    /// Progress log queried by the job status endpoint.
    pub progress: Arc<ProgressLog>,
    /// Page cache, for invalidation and health reporting.
    pub cache: Arc<PageCache>,
    /// Name of the refresh job in the progress log.
    pub job_name: Arc<str>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}
