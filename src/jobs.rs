//! Job identity, status and the record clients poll.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque job identifier. Producers mint UUID v4 values; any non-empty string read back from the
/// queue is accepted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier. Returns `None` for blank input.
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a job. Transitions only move forward:
/// `Pending -> Processing -> {Done | Error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted by the producer, waiting in the queue.
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Extraction and summarization succeeded.
    Done,
    /// Processing failed; the message is stored in both content fields.
    Error,
}

impl JobStatus {
    /// Wire representation stored in the job hash.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// `true` for `Done` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Done | Self::Error => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the forward-only lifecycle.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        next.rank() == self.rank() + 1
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// Status record stored per job and returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Extracted text, or the error message when `status` is `error`.
    pub content: String,
    /// Generated summary, or the error message when `status` is `error`.
    pub summary: String,
}

impl JobRecord {
    /// Record with empty content, used for `pending` and `processing`.
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            content: String::new(),
            summary: String::new(),
        }
    }

    /// Successful terminal record.
    pub fn done(content: String, summary: String) -> Self {
        Self {
            status: JobStatus::Done,
            content,
            summary,
        }
    }

    /// Failed terminal record; the message is surfaced through both fields.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: JobStatus::Error,
            content: message.clone(),
            summary: message,
        }
    }
}
