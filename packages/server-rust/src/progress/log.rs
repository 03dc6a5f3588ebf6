//! Durable, append-only progress log.
//!
//! Every event is one JSON object on its own line. Appends are flushed to
//! disk before returning; the log is only ever truncated as a whole, after
//! a job completes.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use empcache_core::{JobState, ProgressEvent};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

/// Errors raised while reading or writing the progress log.
///
/// None of these are recoverable inside the log: losing a write breaks
/// resumability, so callers decide what to do.
#[derive(Debug, thiserror::Error)]
pub enum ProgressLogError {
    #[error("failed to open progress log {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to append to progress log {}: {source}", .path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read progress log {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to truncate progress log {}: {source}", .path.display())]
    Truncate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode progress event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("progress log task did not finish: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Newline-delimited JSON log of job lifecycle events.
///
/// Shared as `Arc<ProgressLog>` between the warmer, the resume trigger and
/// the HTTP status endpoint. Appends from one process are serialized so each
/// line lands whole; appends from several processes rely on `O_APPEND`.
#[derive(Debug)]
pub struct ProgressLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ProgressLog {
    /// Opens the log at `path`, creating parent directories and an empty
    /// file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressLogError::Open`] if the directory or file cannot be
    /// created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProgressLogError> {
        let path = path.into();
        let open_err = |source| ProgressLogError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        open_append(&path).map_err(open_err)?;

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Runs `op` against the log on the blocking thread pool.
    ///
    /// Appends and truncation fsync, so async callers go through here. The
    /// caller's tracing dispatcher is carried over to the blocking thread.
    ///
    /// # Errors
    ///
    /// Returns whatever `op` returns, or [`ProgressLogError::Join`] if the
    /// blocking task panicked or was cancelled.
    pub async fn run_blocking<T, F>(self: &Arc<Self>, op: F) -> Result<T, ProgressLogError>
    where
        T: Send + 'static,
        F: FnOnce(&ProgressLog) -> Result<T, ProgressLogError> + Send + 'static,
    {
        let log = Arc::clone(self);
        let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
        tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, || op(&log))
        })
        .await?
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one event and syncs it to disk. Returns the event written.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be encoded, written or synced.
    pub fn append(
        &self,
        job_name: &str,
        state: JobState,
        checkpoint: Option<u64>,
        payload: Map<String, Value>,
    ) -> Result<ProgressEvent, ProgressLogError> {
        let event = ProgressEvent::now(job_name, state, checkpoint, payload);
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let append_err = |source| ProgressLogError::Append {
            path: self.path.clone(),
            source,
        };

        {
            let _guard = self.write_lock.lock();
            let mut file = open_append(&self.path).map_err(append_err)?;
            file.write_all(&line).map_err(append_err)?;
            file.sync_data().map_err(append_err)?;
        }

        debug!(
            job = job_name,
            state = %event.state,
            checkpoint = ?event.checkpoint,
            "progress event appended"
        );
        Ok(event)
    }

    /// Truncates the whole log.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressLogError::Truncate`] if the file cannot be truncated.
    pub fn clear(&self) -> Result<(), ProgressLogError> {
        let truncate_err = |source| ProgressLogError::Truncate {
            path: self.path.clone(),
            source,
        };

        let _guard = self.write_lock.lock();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(truncate_err)?;
        file.sync_all().map_err(truncate_err)?;
        debug!(path = %self.path.display(), "progress log cleared");
        Ok(())
    }

    /// Every readable event for `job_name`, in log order.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressLogError::Read`] if the file cannot be read.
    pub fn events(&self, job_name: &str) -> Result<Vec<ProgressEvent>, ProgressLogError> {
        let mut events = Vec::new();
        self.scan(job_name, |event| events.push(event))?;
        Ok(events)
    }

    /// The last event written for `job_name`, by position in the log.
    ///
    /// Timestamps are not compared: when two writers race, whichever line
    /// landed last wins.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressLogError::Read`] if the file cannot be read.
    pub fn latest_state(&self, job_name: &str) -> Result<Option<ProgressEvent>, ProgressLogError> {
        let mut latest = None;
        self.scan(job_name, |event| latest = Some(event))?;
        Ok(latest)
    }

    /// Checkpoint to resume `job_name` from, or `None` if there is nothing
    /// to resume (no events, or the latest state is terminal).
    ///
    /// # Errors
    ///
    /// Returns [`ProgressLogError::Read`] if the file cannot be read.
    pub fn resume_checkpoint(&self, job_name: &str) -> Result<Option<u64>, ProgressLogError> {
        Ok(self
            .latest_state(job_name)?
            .filter(|event| !event.state.is_terminal())
            .map(|event| event.checkpoint.unwrap_or(0)))
    }

    /// Whether the latest state of `job_name` exists and is non-terminal.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressLogError::Read`] if the file cannot be read.
    pub fn has_incomplete_job(&self, job_name: &str) -> Result<bool, ProgressLogError> {
        Ok(self
            .latest_state(job_name)?
            .is_some_and(|event| !event.state.is_terminal()))
    }

    /// Feeds every parseable event for `job_name` to `visit`, skipping blank
    /// and malformed lines.
    fn scan(
        &self,
        job_name: &str,
        mut visit: impl FnMut(ProgressEvent),
    ) -> Result<(), ProgressLogError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(ProgressLogError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        for (index, line) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<ProgressEvent>(line) {
                Ok(event) if event.job_name == job_name => visit(event),
                Ok(_) => {}
                Err(err) => {
                    debug!(line = index + 1, error = %err, "skipping malformed progress log line");
                }
            }
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
