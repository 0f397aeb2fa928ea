//! Entry, identifier and error types shared by work queue implementations.

use crate::jobs::JobId;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

const JOB_ID_FIELD: &str = "job_id";
const PARSER_FIELD: &str = "parser";

/// Log position assigned by the queue when an entry is appended (`<ms>-<seq>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryId(String);

impl EntryId {
    /// Wrap a position reported by the queue backend.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the position as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload of one queued job. The blob is located through the job id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Job the entry refers to.
    pub job_id: JobId,
    /// Raw parser selector; validated by the worker, not the queue.
    pub parser: String,
}

impl QueueEntry {
    /// Build an entry for the given job and selector.
    pub fn new(job_id: JobId, parser: impl Into<String>) -> Self {
        Self {
            job_id,
            parser: parser.into(),
        }
    }

    /// Field/value pairs written to the stream.
    pub fn to_fields(&self) -> [(&'static str, String); 2] {
        [
            (JOB_ID_FIELD, self.job_id.to_string()),
            (PARSER_FIELD, self.parser.clone()),
        ]
    }

    /// Decode stream fields. A missing `parser` reads as an empty selector so the worker can
    /// report it against the job; a missing `job_id` makes the entry unusable.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, MalformedEntry> {
        let job_id = fields
            .get(JOB_ID_FIELD)
            .and_then(|value| JobId::parse(value))
            .ok_or_else(|| MalformedEntry("missing job_id field".into()))?;
        let parser = fields.get(PARSER_FIELD).cloned().unwrap_or_default();
        Ok(Self { job_id, parser })
    }
}

/// Entry that cannot be tied to a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed queue entry: {0}")]
pub struct MalformedEntry(pub String);

/// One entry handed to a consumer by [`crate::queue::WorkQueue::read_next`].
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Position to acknowledge once handled.
    pub id: EntryId,
    /// Decoded payload, or why it could not be decoded.
    pub entry: Result<QueueEntry, MalformedEntry>,
}

/// Errors returned while interacting with the work queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The backing service could not be reached or rejected the command.
    #[error("Work queue unavailable: {0}")]
    Unavailable(String),
    /// Consumer group creation failed for a reason other than "already exists".
    #[error("Failed to create consumer group {group} on {topic}: {reason}")]
    GroupCreation {
        /// Stream the group was created on.
        topic: String,
        /// Group name.
        group: String,
        /// Backend failure.
        reason: String,
    },
    /// A read referenced a consumer group that was never joined.
    #[error("Consumer group {group} does not exist on {topic}")]
    NoGroup {
        /// Stream that was read.
        topic: String,
        /// Missing group.
        group: String,
    },
    /// The backend replied with a shape the client does not understand.
    #[error("Unexpected queue response: {0}")]
    UnexpectedResponse(String),
}

impl From<redis::RedisError> for QueueError {
    fn from(error: redis::RedisError) -> Self {
        Self::Unavailable(error.to_string())
    }
}
