//! Producer and polling boundary: creates jobs and reports their status.

use crate::{
    jobs::{JobId, JobRecord, JobStatus},
    queue::{QueueEntry, QueueError, WorkQueue},
    store::{JobStore, StoreError},
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced to producers and pollers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Job store failure, including unknown job ids.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Work queue failure while enqueueing.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl ServiceError {
    /// Whether the error means the job does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_not_found())
    }
}

/// Abstraction over job submission and polling used by the HTTP surface.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Store the document, mark the job `pending` and queue it under a fresh id.
    async fn create_job(&self, parser: &str, document: &[u8]) -> Result<JobId, ServiceError>;

    /// Current record of a job.
    async fn get_status(&self, id: &JobId) -> Result<JobRecord, ServiceError>;

    /// Check that the backing store answers.
    async fn health(&self) -> Result<(), ServiceError>;
}

/// Job submission backed by a [`JobStore`] and a [`WorkQueue`].
pub struct JobService {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    topic: String,
}

impl JobService {
    /// Build a service publishing jobs to `topic`.
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            topic: topic.into(),
        }
    }

    /// Submit a job under a caller-supplied id.
    ///
    /// The blob and the `pending` record are written before the entry is appended, so a worker
    /// claiming the entry always finds both.
    pub async fn enqueue_job(
        &self,
        id: &JobId,
        parser: &str,
        document: &[u8],
    ) -> Result<(), ServiceError> {
        self.store.put_blob(id, document).await?;
        self.store
            .put_status(id, JobStatus::Pending, "", "")
            .await?;
        let entry_id = self
            .queue
            .enqueue(&self.topic, &QueueEntry::new(id.clone(), parser))
            .await?;
        tracing::info!(
            job_id = %id,
            entry_id = %entry_id,
            parser,
            bytes = document.len(),
            "Job queued"
        );
        Ok(())
    }
}

#[async_trait]
impl JobApi for JobService {
    async fn create_job(&self, parser: &str, document: &[u8]) -> Result<JobId, ServiceError> {
        let id = JobId::new();
        self.enqueue_job(&id, parser, document).await?;
        Ok(id)
    }

    async fn get_status(&self, id: &JobId) -> Result<JobRecord, ServiceError> {
        Ok(self.store.get_status(id).await?)
    }

    async fn health(&self) -> Result<(), ServiceError> {
        Ok(self.store.ping().await?)
    }
}
