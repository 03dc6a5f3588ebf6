//! Background worker for periodic and on-demand tasks.
//!
//! Provides a generic `BackgroundWorker<R>` that processes tasks from an mpsc channel
//! via a `BackgroundRunnable` implementation, with optional periodic tick callbacks.
//! [`WarmerRunnable`] plugs the cache warmer into it as the refresh scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::warmer::CacheWarmer;
use crate::traits::JobQueue;

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Trait for task handlers executed by `BackgroundWorker`.
///
/// Implementors define how individual tasks are processed, what happens on each
/// periodic tick, and how to clean up on shutdown.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// The type of task this runnable processes.
    type Task: Send + 'static;

    /// Process a single task.
    async fn run(&mut self, task: Self::Task);

    /// Called periodically (on each tick interval). Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker is shutting down. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// WarmerTask
// ---------------------------------------------------------------------------

/// Task variants for the cache warmer scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmerTask {
    /// Run a refresh. `None` fields fall back to the progress log checkpoint
    /// and the configured page size.
    Refresh {
        start_after: Option<u64>,
        batch_size: Option<usize>,
    },
    /// Drop every cached page.
    ClearCache,
}

impl WarmerTask {
    /// A refresh that resumes from the progress log with default batching.
    #[must_use]
    pub fn refresh() -> Self {
        Self::Refresh {
            start_after: None,
            batch_size: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Generic background worker that processes tasks via an mpsc channel.
///
/// The worker spawns a tokio task that:
/// 1. Listens for tasks on the mpsc channel
/// 2. Calls `BackgroundRunnable::run()` for each task
/// 3. Periodically calls `BackgroundRunnable::on_tick()` at the configured interval
/// 4. Calls `BackgroundRunnable::shutdown()` when stopped
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Start the background worker with the given runnable and tick interval.
    ///
    /// Returns a `BackgroundWorker` handle that can be used to submit tasks
    /// and stop the worker. The channel capacity is fixed at 256. A zero
    /// interval is raised to 1ms.
    pub fn start(mut runnable: R, tick_interval_ms: u64) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(256);
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut tick_interval =
                tokio::time::interval(std::time::Duration::from_millis(tick_interval_ms.max(1)));
            // Skip the first immediate tick so on_tick doesn't fire at startup.
            tick_interval.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(t) => runnable.run(t).await,
                            None => break, // Channel closed.
                        }
                    }
                    _ = tick_interval.tick() => {
                        runnable.on_tick().await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            runnable.shutdown().await;
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Submit a task to the worker.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped or the channel is full.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("worker channel closed")),
            None => Err(anyhow::anyhow!("worker not running")),
        }
    }

    /// Returns a cloneable handle for submitting tasks from other components,
    /// or `None` once the worker has been stopped.
    #[must_use]
    pub fn sender(&self) -> Option<TaskSender<R::Task>> {
        self.tx.clone().map(|tx| TaskSender { tx })
    }

    /// Stop the worker gracefully, waiting for the worker task to complete.
    ///
    /// A task that is already running finishes first.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// Cloneable submit handle detached from the worker's lifetime.
pub struct TaskSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for TaskSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

#[async_trait]
impl JobQueue for TaskSender<WarmerTask> {
    async fn enqueue(&self, task: WarmerTask) -> anyhow::Result<()> {
        self.tx
            .send(task)
            .await
            .map_err(|_| anyhow::anyhow!("worker channel closed"))
    }
}

// ---------------------------------------------------------------------------
// WarmerRunnable
// ---------------------------------------------------------------------------

/// Runs cache warmer tasks and a default refresh on every tick.
pub struct WarmerRunnable {
    warmer: Arc<CacheWarmer>,
}

impl WarmerRunnable {
    #[must_use]
    pub fn new(warmer: Arc<CacheWarmer>) -> Self {
        Self { warmer }
    }

    async fn refresh(&self, start_after: Option<u64>, batch_size: Option<usize>) {
        match self.warmer.refresh(start_after, batch_size).await {
            Ok(outcome) => {
                counter!("empcache_warm_runs_total", "outcome" => "completed").increment(1);
                info!(processed = outcome.processed_count, "scheduled refresh finished");
            }
            Err(e) => {
                counter!("empcache_warm_runs_total", "outcome" => "failed").increment(1);
                error!(error = %e, "cache refresh failed");
                if self.warmer.config().mark_failed_runs {
                    if let Err(log_err) = self.warmer.record_failure(&e).await {
                        warn!(error = %log_err, "could not record failed run");
                    }
                }
            }
        }
    }
}

#[async_trait]
impl BackgroundRunnable for WarmerRunnable {
    type Task = WarmerTask;

    async fn run(&mut self, task: WarmerTask) {
        match task {
            WarmerTask::Refresh {
                start_after,
                batch_size,
            } => self.refresh(start_after, batch_size).await,
            WarmerTask::ClearCache => match self.warmer.cache().clear_all() {
                Ok(deleted) => info!(deleted, "page cache cleared"),
                Err(e) => warn!(error = %e, "page cache clear failed"),
            },
        }
    }

    async fn on_tick(&mut self) {
        let purged = self.warmer.cache().engine().purge_expired();
        if purged > 0 {
            info!(purged, "expired cache entries purged");
        }
        self.refresh(None, None).await;
    }

    async fn shutdown(&mut self) {
        info!("cache warmer scheduler stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
