//! Job lifecycle events recorded in the progress log.
//!
//! A [`ProgressEvent`] is one line of the newline-delimited JSON log. The
//! latest event for a job name decides whether that job can be resumed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state of a job as written to the progress log.
///
/// Serialized as its upper-case name. States written by other versions are
/// preserved as [`JobState::Unknown`] and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobState {
    Started,
    Checkpoint,
    ResumeQueued,
    Completed,
    Failed,
    Unknown(String),
}

impl JobState {
    /// Returns the wire name of this state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Started => "STARTED",
            Self::Checkpoint => "CHECKPOINT",
            Self::ResumeQueued => "RESUME_QUEUED",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Unknown(name) => name,
        }
    }

    /// `COMPLETED` and `FAILED` end a job; nothing resumes after them.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl From<String> for JobState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "STARTED" => Self::Started,
            "CHECKPOINT" => Self::Checkpoint,
            "RESUME_QUEUED" => Self::ResumeQueued,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::Unknown(value),
        }
    }
}

impl From<JobState> for String {
    fn from(value: JobState) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unknown_state() -> JobState {
    JobState::Unknown("UNKNOWN".to_string())
}

/// One entry of the progress log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Wall-clock time the event was written (RFC 3339, UTC). Lines written
    /// without one still count.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub job_name: String,
    #[serde(default = "unknown_state")]
    pub state: JobState,
    /// Records processed so far. `None` for events that carry no position.
    #[serde(default)]
    pub checkpoint: Option<u64>,
    /// Free-form details (page number, run id, whether a cache insert happened).
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl ProgressEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn now(
        job_name: impl Into<String>,
        state: JobState,
        checkpoint: Option<u64>,
        payload: Map<String, Value>,
    ) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            job_name: job_name.into(),
            state,
            checkpoint,
            payload,
        }
    }
}

/// Converts a `json!({...})` literal into an event payload.
///
/// Non-object values produce an empty payload.
#[must_use]
pub fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
