//! Resuming interrupted refresh runs.
//!
//! [`ResumeTrigger`] inspects the progress log and re-queues an unfinished
//! run from its checkpoint. [`StartupHook`] performs that check once per
//! process, optionally followed by a full refresh.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use empcache_core::{payload, JobState};
use serde_json::json;
use tracing::{info, warn};

use super::worker::WarmerTask;
use crate::progress::ProgressLog;
use crate::traits::JobQueue;

static STARTUP_DONE: AtomicBool = AtomicBool::new(false);

/// Re-queues an unfinished refresh job from its last checkpoint.
pub struct ResumeTrigger {
    log: Arc<ProgressLog>,
    queue: Arc<dyn JobQueue>,
    job_name: String,
}

impl ResumeTrigger {
    #[must_use]
    pub fn new(log: Arc<ProgressLog>, queue: Arc<dyn JobQueue>, job_name: impl Into<String>) -> Self {
        Self {
            log,
            queue,
            job_name: job_name.into(),
        }
    }

    /// Queues a resumed refresh if the job's latest state is non-terminal.
    ///
    /// Failures are logged and swallowed; the caller cannot act on them.
    pub async fn queue_resume_if_needed(&self) {
        if let Err(e) = self.try_queue_resume().await {
            warn!(job = %self.job_name, error = %e, "resume check failed");
        }
    }

    /// Returns the checkpoint a run was queued from, if any.
    async fn try_queue_resume(&self) -> anyhow::Result<Option<u64>> {
        let job = self.job_name.clone();
        let queued_from = self
            .log
            .run_blocking(move |log| {
                if !log.has_incomplete_job(&job)? {
                    return Ok(None);
                }
                let checkpoint = log.resume_checkpoint(&job)?.unwrap_or(0);
                log.append(
                    &job,
                    JobState::ResumeQueued,
                    Some(checkpoint),
                    payload(json!({ "checkpoint": checkpoint })),
                )?;
                Ok(Some(checkpoint))
            })
            .await?;
        let Some(checkpoint) = queued_from else {
            return Ok(None);
        };

        self.queue
            .enqueue(WarmerTask::Refresh {
                start_after: Some(checkpoint),
                batch_size: None,
            })
            .await?;

        info!(job = %self.job_name, checkpoint, "queued resume of interrupted refresh");
        Ok(Some(checkpoint))
    }
}

/// One-shot startup actions: resume check plus an optional full refresh.
///
/// Runs at most once per process. The flag is only set after the actions
/// succeed, so a startup that could not reach the log or the queue is
/// retried by the next call.
pub struct StartupHook {
    trigger: ResumeTrigger,
    refresh_on_startup: bool,
    done: &'static AtomicBool,
}

impl StartupHook {
    #[must_use]
    pub fn new(trigger: ResumeTrigger, refresh_on_startup: bool) -> Self {
        Self::with_flag(trigger, refresh_on_startup, &STARTUP_DONE)
    }

    fn with_flag(trigger: ResumeTrigger, refresh_on_startup: bool, done: &'static AtomicBool) -> Self {
        Self {
            trigger,
            refresh_on_startup,
            done,
        }
    }

    /// Runs the startup actions unless they already ran in this process.
    ///
    /// Returns `true` if this call performed them successfully.
    pub async fn run_once(&self) -> bool {
        if self.done.load(Ordering::Acquire) {
            return false;
        }

        match self.run_actions().await {
            Ok(()) => {
                self.done.store(true, Ordering::Release);
                true
            }
            Err(e) => {
                warn!(error = %e, "startup cache actions failed");
                false
            }
        }
    }

    async fn run_actions(&self) -> anyhow::Result<()> {
        self.trigger.try_queue_resume().await?;
        if self.refresh_on_startup {
            self.trigger.queue.enqueue(WarmerTask::refresh()).await?;
            info!("queued startup refresh");
        }
        Ok(())
    }
}
