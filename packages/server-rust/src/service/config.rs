use empcache_core::DEFAULT_PAGE_SIZE;

/// Name under which the cache refresh job records its progress.
pub const REFRESH_JOB_NAME: &str = "employee_cache_refresh";

/// Configuration for the cache warmer and its scheduler.
///
/// Controls the job name, page size, and the periodic refresh interval.
#[derive(Debug, Clone)]
pub struct WarmerConfig {
    /// Job name used for every progress event.
    pub job_name: String,
    /// Records per page; also the warmer's default batch size.
    pub page_size: usize,
    /// Interval between scheduled refresh runs in milliseconds.
    pub refresh_interval_ms: u64,
    /// Queue one full refresh when the process starts.
    pub refresh_on_startup: bool,
    /// Append a `FAILED` event when a scheduled run errors. Off by default,
    /// which keeps a failed run resumable from its last checkpoint.
    pub mark_failed_runs: bool,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            job_name: REFRESH_JOB_NAME.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            refresh_interval_ms: 300_000,
            refresh_on_startup: false,
            mark_failed_runs: false,
        }
    }
}
