//! Job store: per-job status records and the uploaded document blob, keyed by job id.

pub mod memory;
pub mod redis;
pub mod types;

pub use self::memory::MemoryJobStore;
pub use self::redis::RedisJobStore;
pub use self::types::StoreError;

use crate::jobs::{JobId, JobRecord, JobStatus};
use async_trait::async_trait;

/// Storage contract for job status and document blobs.
///
/// Implementations never retry internally; callers decide how to treat
/// [`StoreError::Unavailable`].
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Overwrite the full status record in a single command. Idempotent.
    async fn put_status(
        &self,
        id: &JobId,
        status: JobStatus,
        content: &str,
        summary: &str,
    ) -> Result<(), StoreError>;

    /// Fetch the current record, or [`StoreError::JobNotFound`].
    async fn get_status(&self, id: &JobId) -> Result<JobRecord, StoreError>;

    /// Store the raw document bytes for the job.
    async fn put_blob(&self, id: &JobId, bytes: &[u8]) -> Result<(), StoreError>;

    /// Fetch the raw document bytes, or [`StoreError::BlobNotFound`].
    async fn get_blob(&self, id: &JobId) -> Result<Vec<u8>, StoreError>;

    /// Remove the document bytes. Removing an absent blob succeeds.
    async fn delete_blob(&self, id: &JobId) -> Result<(), StoreError>;

    /// Connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Convenience wrapper writing a [`JobRecord`] through [`JobStore::put_status`].
pub async fn put_record(
    store: &dyn JobStore,
    id: &JobId,
    record: &JobRecord,
) -> Result<(), StoreError> {
    store
        .put_status(id, record.status, &record.content, &record.summary)
        .await
}
