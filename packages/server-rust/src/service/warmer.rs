//! Resumable cache warmer.
//!
//! [`CacheWarmer::refresh`] walks the record source page by page from a
//! checkpoint, fills the page cache with conditional inserts, and appends a
//! `CHECKPOINT` event after every page. A run that dies part-way leaves its
//! last checkpoint in the progress log for the next run to pick up.

use std::sync::Arc;

use empcache_core::{clamp_page_size, first_page_after, payload, JobState};
use metrics::counter;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use super::config::WarmerConfig;
use crate::progress::{ProgressLog, ProgressLogError};
use crate::storage::{CacheError, PageCache};
use crate::traits::RecordSource;

/// Result of a completed refresh run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    /// Records counted by this run, including those before its start checkpoint.
    pub processed_count: u64,
    /// The checkpoint written with the `COMPLETED` event.
    pub last_checkpoint: u64,
}

/// Errors that abort a refresh run.
///
/// The warmer never retries; the scheduler decides what happens next.
#[derive(Debug, thiserror::Error)]
pub enum WarmerError {
    #[error(transparent)]
    Progress(#[from] ProgressLogError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("record store read failed for page {page}: {source}")]
    Store {
        page: u64,
        #[source]
        source: anyhow::Error,
    },
}

/// Walks the record source and populates the page cache.
pub struct CacheWarmer {
    source: Arc<dyn RecordSource>,
    cache: Arc<PageCache>,
    log: Arc<ProgressLog>,
    config: WarmerConfig,
}

impl CacheWarmer {
    #[must_use]
    pub fn new(
        source: Arc<dyn RecordSource>,
        cache: Arc<PageCache>,
        log: Arc<ProgressLog>,
        config: WarmerConfig,
    ) -> Self {
        Self {
            source,
            cache,
            log,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &WarmerConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<PageCache> {
        &self.cache
    }

    /// Runs the refresh job to completion.
    ///
    /// `start_after` is the number of records already processed; when `None`
    /// the checkpoint comes from the progress log (0 if there is nothing to
    /// resume). `batch_size` defaults to the configured page size.
    ///
    /// Pages are visited in increasing order starting at
    /// `start_after / batch_size + 1` until the source returns an empty page.
    /// On success the job is marked `COMPLETED` and the log is cleared.
    ///
    /// # Errors
    ///
    /// Returns the first store, cache or progress log failure. Events written
    /// before the failure stay in the log.
    pub async fn refresh(
        &self,
        start_after: Option<u64>,
        batch_size: Option<usize>,
    ) -> Result<RefreshOutcome, WarmerError> {
        let job = self.config.job_name.as_str();
        let batch_size = clamp_page_size(batch_size.unwrap_or(self.config.page_size));
        let run_id = Uuid::new_v4().to_string();

        let checkpoint = match start_after {
            Some(checkpoint) => checkpoint,
            None => {
                let name = job.to_string();
                self.log
                    .run_blocking(move |log| log.resume_checkpoint(&name))
                    .await?
                    .unwrap_or(0)
            }
        };

        self.append(
            JobState::Started,
            Some(checkpoint),
            payload(json!({ "run_id": run_id, "batch_size": batch_size })),
        )
        .await?;
        info!(job, run_id = %run_id, checkpoint, batch_size, "cache refresh started");

        let mut processed = checkpoint;
        let mut page = first_page_after(checkpoint, batch_size);

        loop {
            let batch = self
                .source
                .page_of_records(page, batch_size)
                .await
                .map_err(|source| WarmerError::Store { page, source })?;
            if batch.is_empty() {
                break;
            }

            let inserted = self.cache.add_page_if_absent(page, &batch)?;
            processed += batch.len() as u64;
            self.append(
                JobState::Checkpoint,
                Some(processed),
                payload(json!({
                    "processed_count": processed,
                    "page": page,
                    "cache_inserted": inserted,
                    "run_id": run_id,
                })),
            )
            .await?;
            counter!("empcache_pages_warmed_total").increment(1);
            debug!(job, page, processed, inserted, "page warmed");

            page += 1;
        }

        let completed = payload(json!({ "processed_count": processed }));
        let name = job.to_string();
        self.log
            .run_blocking(move |log| {
                log.append(&name, JobState::Completed, Some(processed), completed)?;
                log.clear()
            })
            .await?;
        info!(job, run_id = %run_id, processed, "cache refresh completed");

        Ok(RefreshOutcome {
            processed_count: processed,
            last_checkpoint: processed,
        })
    }

    /// Appends a `FAILED` event for the job, keeping the last known checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the progress log cannot be read or written.
    pub async fn record_failure(&self, error: &WarmerError) -> Result<(), ProgressLogError> {
        let job = self.config.job_name.clone();
        let details = payload(json!({ "error": error.to_string() }));
        self.log
            .run_blocking(move |log| {
                let checkpoint = log.latest_state(&job)?.and_then(|event| event.checkpoint);
                log.append(&job, JobState::Failed, checkpoint, details)?;
                Ok(())
            })
            .await
    }

    async fn append(
        &self,
        state: JobState,
        checkpoint: Option<u64>,
        details: Map<String, Value>,
    ) -> Result<(), ProgressLogError> {
        let job = self.config.job_name.clone();
        self.log
            .run_blocking(move |log| log.append(&job, state, checkpoint, details))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use empcache_core::{page_key, EmployeeRecord, PageBatch, ProgressEvent};
    use parking_lot::Mutex;

    use super::*;
    use crate::storage::datastores::{synthetic_record, MemoryRecordSource};
    use crate::testutil::Fixture;

    /// Record source that captures the job's latest checkpoint each time a
    /// page is requested, so tests can observe the event sequence even
    /// though a successful run clears the log.
    struct ObservingSource {
        inner: MemoryRecordSource,
        log: Arc<ProgressLog>,
        seen: Mutex<Vec<(u64, Option<u64>)>>,
    }

    #[async_trait]
    impl RecordSource for ObservingSource {
        async fn page_of_records(&self, page: u64, page_size: usize) -> anyhow::Result<PageBatch> {
            let latest = self
                .log
                .latest_state(crate::service::REFRESH_JOB_NAME)?
                .and_then(|e| e.checkpoint);
            self.seen.lock().push((page, latest));
            self.inner.page_of_records(page, page_size).await
        }

        async fn count_records(&self) -> anyhow::Result<u64> {
            self.inner.count_records().await
        }

        async fn records_after_id(&self, last_id: i64, limit: usize) -> anyhow::Result<PageBatch> {
            self.inner.records_after_id(last_id, limit).await
        }
    }

    /// Record source that fails on one page until `healed` is set.
    struct FlakySource {
        inner: MemoryRecordSource,
        fail_on_page: u64,
        healed: AtomicBool,
    }

    #[async_trait]
    impl RecordSource for FlakySource {
        async fn page_of_records(&self, page: u64, page_size: usize) -> anyhow::Result<PageBatch> {
            if page == self.fail_on_page && !self.healed.load(Ordering::SeqCst) {
                anyhow::bail!("connection reset");
            }
            self.inner.page_of_records(page, page_size).await
        }

        async fn count_records(&self) -> anyhow::Result<u64> {
            self.inner.count_records().await
        }

        async fn records_after_id(&self, last_id: i64, limit: usize) -> anyhow::Result<PageBatch> {
            self.inner.records_after_id(last_id, limit).await
        }
    }

    #[tokio::test]
    async fn full_run_checkpoints_every_page_then_clears_log() {
        let fx = Fixture::new(0);
        let source = Arc::new(ObservingSource {
            inner: MemoryRecordSource::seeded(2500),
            log: fx.log.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let warmer = fx.warmer_with(source.clone());

        let outcome = warmer.refresh(Some(0), None).await.unwrap();

        assert_eq!(
            outcome,
            RefreshOutcome {
                processed_count: 2500,
                last_checkpoint: 2500
            }
        );
        // Before each fetch, the latest event is the previous page's checkpoint.
        assert_eq!(
            *source.seen.lock(),
            vec![(1, Some(0)), (2, Some(1000)), (3, Some(2000)), (4, Some(2500))]
        );
        assert!(fx.log.latest_state(&warmer.config().job_name).unwrap().is_none());
        assert_eq!(fx.cache.cached_pages().unwrap(), vec![1, 2, 3]);
        assert_eq!(fx.cache.get_page(3).unwrap().unwrap().len(), 500);
    }

    /// Tracing layer that re-reads the job's latest state through its own
    /// handle on the log file every time an event is emitted.
    struct LatestStateTap {
        reader: ProgressLog,
        seen: Arc<Mutex<Vec<ProgressEvent>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for LatestStateTap {
        fn on_event(
            &self,
            _event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if let Ok(Some(latest)) = self.reader.latest_state(crate::service::REFRESH_JOB_NAME) {
                self.seen.lock().push(latest);
            }
        }
    }

    #[tokio::test]
    async fn completed_event_lands_before_the_log_is_cleared() {
        use tracing_subscriber::layer::SubscriberExt;

        let fx = Fixture::new(2500);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let tap = LatestStateTap {
            reader: ProgressLog::open(fx.log.path()).unwrap(),
            seen: seen.clone(),
        };
        let _default = tracing::subscriber::set_default(tracing_subscriber::registry().with(tap));

        fx.warmer().refresh(Some(0), None).await.unwrap();

        let seen = seen.lock();
        let completed: Vec<&ProgressEvent> = seen
            .iter()
            .filter(|event| event.state == JobState::Completed)
            .collect();
        assert!(!completed.is_empty(), "COMPLETED was never readable from the log");
        assert!(completed.iter().all(|event| event.checkpoint == Some(2500)));
        assert_eq!(completed[0].payload["processed_count"], 2500);
        // Nothing but the truncation follows COMPLETED.
        assert_eq!(seen.last().unwrap().state, JobState::Completed);
        assert!(fx.log.events(crate::service::REFRESH_JOB_NAME).unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkpoint_events_carry_page_and_insert_flag() {
        let fx = Fixture::new(2500);
        let source: Arc<dyn RecordSource> = Arc::new(FlakySource {
            inner: MemoryRecordSource::seeded(2500),
            fail_on_page: 3,
            healed: AtomicBool::new(false),
        });
        let warmer = fx.warmer_with(source);
        // Page 2 is already cached by a reader.
        fx.cache.set_page(2, &vec![synthetic_record(1001)]).unwrap();

        let err = warmer.refresh(None, None).await.unwrap_err();
        assert!(matches!(err, WarmerError::Store { page: 3, .. }));

        let events = fx.log.events(&warmer.config().job_name).unwrap();
        let states: Vec<JobState> = events.iter().map(|e| e.state.clone()).collect();
        assert_eq!(
            states,
            vec![JobState::Started, JobState::Checkpoint, JobState::Checkpoint]
        );

        let first = &events[1];
        assert_eq!(first.checkpoint, Some(1000));
        assert_eq!(first.payload["page"], 1);
        assert_eq!(first.payload["processed_count"], 1000);
        assert_eq!(first.payload["cache_inserted"], true);

        let second = &events[2];
        assert_eq!(second.checkpoint, Some(2000));
        assert_eq!(second.payload["page"], 2);
        assert_eq!(second.payload["cache_inserted"], false);
        assert_eq!(first.payload["run_id"], second.payload["run_id"]);
    }

    #[tokio::test]
    async fn crash_then_resume_completes_from_checkpoint() {
        let fx = Fixture::new(2500);
        let flaky = Arc::new(FlakySource {
            inner: MemoryRecordSource::seeded(2500),
            fail_on_page: 3,
            healed: AtomicBool::new(false),
        });
        let warmer = fx.warmer_with(flaky.clone());
        let job = warmer.config().job_name.clone();

        assert!(warmer.refresh(None, None).await.is_err());
        assert_eq!(fx.log.resume_checkpoint(&job).unwrap(), Some(2000));
        assert!(fx.log.has_incomplete_job(&job).unwrap());

        flaky.healed.store(true, Ordering::SeqCst);
        let outcome = warmer.refresh(None, None).await.unwrap();

        assert_eq!(outcome.processed_count, 2500);
        assert!(!fx.log.has_incomplete_job(&job).unwrap());
        assert_eq!(fx.cache.cached_pages().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn resumed_run_starts_at_page_after_checkpoint() {
        let fx = Fixture::new(0);
        let source = Arc::new(ObservingSource {
            inner: MemoryRecordSource::seeded(2500),
            log: fx.log.clone(),
            seen: Mutex::new(Vec::new()),
        });
        let warmer = fx.warmer_with(source.clone());
        let job = warmer.config().job_name.clone();
        fx.log
            .append(&job, JobState::Checkpoint, Some(2000), serde_json::Map::new())
            .unwrap();

        let outcome = warmer.refresh(None, None).await.unwrap();

        let pages: Vec<u64> = source.seen.lock().iter().map(|(p, _)| *p).collect();
        assert_eq!(pages, vec![3, 4]);
        assert_eq!(outcome.processed_count, 2500);
        assert!(!fx.cache.has_page(1).unwrap());
    }

    #[tokio::test]
    async fn explicit_start_overrides_log_checkpoint() {
        let fx = Fixture::new(2500);
        let warmer = fx.warmer();
        let job = warmer.config().job_name.clone();
        fx.log
            .append(&job, JobState::Checkpoint, Some(2000), serde_json::Map::new())
            .unwrap();

        let outcome = warmer.refresh(Some(0), None).await.unwrap();

        assert_eq!(outcome.processed_count, 2500);
        assert_eq!(fx.cache.cached_pages().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn terminal_log_state_restarts_from_zero() {
        let fx = Fixture::new(1500);
        let warmer = fx.warmer();
        let job = warmer.config().job_name.clone();
        fx.log
            .append(&job, JobState::Failed, Some(1000), serde_json::Map::new())
            .unwrap();

        let outcome = warmer.refresh(None, None).await.unwrap();

        assert_eq!(outcome.processed_count, 1500);
        assert!(fx.cache.has_page(1).unwrap());
    }

    #[tokio::test]
    async fn rerun_is_idempotent_for_cached_pages() {
        let fx = Fixture::new(2500);
        let warmer = fx.warmer();
        fx.cache
            .set_page(1, &vec![synthetic_record(999_999)])
            .unwrap();

        warmer.refresh(Some(0), None).await.unwrap();
        warmer.refresh(Some(0), None).await.unwrap();

        // The page cached before the warmer ran is left alone.
        let page_one = fx.cache.get_page(1).unwrap().unwrap();
        assert_eq!(page_one[0].id, 999_999);
        assert_eq!(fx.cache.get_page(2).unwrap().unwrap()[0].id, 1001);
    }

    #[tokio::test]
    async fn custom_batch_size_changes_page_boundaries() {
        let fx = Fixture::new(25);
        let warmer = fx.warmer();

        let outcome = warmer.refresh(Some(0), Some(10)).await.unwrap();

        assert_eq!(outcome.processed_count, 25);
        assert_eq!(fx.cache.cached_pages().unwrap(), vec![1, 2, 3]);
        let third: Vec<i64> = fx
            .cache
            .get_page(3)
            .unwrap()
            .unwrap()
            .iter()
            .map(|r: &EmployeeRecord| r.id)
            .collect();
        assert_eq!(third, (21..=25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped() {
        let fx = Fixture::new(3);
        let warmer = fx.warmer();

        let outcome = warmer.refresh(Some(0), Some(0)).await.unwrap();

        assert_eq!(outcome.processed_count, 3);
        assert_eq!(fx.cache.cached_pages().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_source_completes_immediately() {
        let fx = Fixture::new(0);
        let warmer = fx.warmer();

        let outcome = warmer.refresh(None, None).await.unwrap();

        assert_eq!(outcome.processed_count, 0);
        assert!(fx.cache.cached_pages().unwrap().is_empty());
        assert!(!fx.cache.engine().contains(&page_key(1)).unwrap());
    }

    #[tokio::test]
    async fn record_failure_appends_terminal_event() {
        let fx = Fixture::new(10);
        let warmer = fx.warmer();
        let job = warmer.config().job_name.clone();
        fx.log
            .append(&job, JobState::Checkpoint, Some(1000), serde_json::Map::new())
            .unwrap();

        let err = WarmerError::Store {
            page: 2,
            source: anyhow::anyhow!("timeout"),
        };
        warmer.record_failure(&err).await.unwrap();

        let latest = fx.log.latest_state(&job).unwrap().unwrap();
        assert_eq!(latest.state, JobState::Failed);
        assert_eq!(latest.checkpoint, Some(1000));
        assert!(latest.payload["error"].as_str().unwrap().contains("page 2"));
        assert!(!fx.log.has_incomplete_job(&job).unwrap());
    }
}
