//! Error type shared by job store implementations.

use crate::jobs::JobId;
use thiserror::Error;

/// Errors returned while reading or writing job state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing service could not be reached or rejected the command.
    #[error("Job store unavailable: {0}")]
    Unavailable(String),
    /// No status record exists for the job.
    #[error("Job {0} not found")]
    JobNotFound(JobId),
    /// No document blob exists for the job.
    #[error("Document not found for job {0}")]
    BlobNotFound(JobId),
    /// A stored record could not be decoded.
    #[error("Corrupt job record for {id}: {reason}")]
    Corrupt {
        /// Job whose record failed to decode.
        id: JobId,
        /// Decoding failure.
        reason: String,
    },
}

impl StoreError {
    /// `true` when the job or its blob is missing, as opposed to an infrastructure failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::JobNotFound(_) | Self::BlobNotFound(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(error: redis::RedisError) -> Self {
        Self::Unavailable(error.to_string())
    }
}
