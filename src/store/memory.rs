//! In-process job store used by tests and single-process runs.

use super::{JobStore, StoreError};
use crate::jobs::{JobId, JobRecord, JobStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Job store held entirely in memory.
///
/// Every status write is also appended to a per-job history so tests can assert on the sequence
/// of transitions a poller could have observed.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    records: HashMap<JobId, JobRecord>,
    blobs: HashMap<JobId, Vec<u8>>,
    history: HashMap<JobId, Vec<JobStatus>>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status written for the job, oldest first.
    pub async fn status_history(&self, id: &JobId) -> Vec<JobStatus> {
        let guard = self.inner.lock().await;
        guard.history.get(id).cloned().unwrap_or_default()
    }

    /// Whether a blob is currently stored for the job.
    pub async fn has_blob(&self, id: &JobId) -> bool {
        self.inner.lock().await.blobs.contains_key(id)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn put_status(
        &self,
        id: &JobId,
        status: JobStatus,
        content: &str,
        summary: &str,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().await;
        guard.records.insert(
            id.clone(),
            JobRecord {
                status,
                content: content.to_string(),
                summary: summary.to_string(),
            },
        );
        guard.history.entry(id.clone()).or_default().push(status);
        Ok(())
    }

    async fn get_status(&self, id: &JobId) -> Result<JobRecord, StoreError> {
        let guard = self.inner.lock().await;
        guard
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::JobNotFound(id.clone()))
    }

    async fn put_blob(&self, id: &JobId, bytes: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.inner.lock().await;
        guard.blobs.insert(id.clone(), bytes.to_vec());
        Ok(())
    }

    async fn get_blob(&self, id: &JobId) -> Result<Vec<u8>, StoreError> {
        let guard = self.inner.lock().await;
        guard
            .blobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(id.clone()))
    }

    async fn delete_blob(&self, id: &JobId) -> Result<(), StoreError> {
        self.inner.lock().await.blobs.remove(id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_status_overwrites_all_fields() {
        let store = MemoryJobStore::new();
        let id = JobId::new();
        store
            .put_status(&id, JobStatus::Done, "content", "summary")
            .await
            .expect("put");
        store
            .put_status(&id, JobStatus::Error, "oops", "oops")
            .await
            .expect("put");

        let record = store.get_status(&id).await.expect("record");
        assert_eq!(record, JobRecord::error("oops"));
    }

    #[tokio::test]
    async fn put_status_is_idempotent() {
        let store = MemoryJobStore::new();
        let id = JobId::new();
        for _ in 0..2 {
            store
                .put_status(&id, JobStatus::Pending, "", "")
                .await
                .expect("put");
        }
        assert_eq!(
            store.get_status(&id).await.expect("record"),
            JobRecord::new(JobStatus::Pending)
        );
    }

    #[tokio::test]
    async fn missing_job_and_blob_are_not_found() {
        let store = MemoryJobStore::new();
        let id = JobId::new();
        assert!(matches!(
            store.get_status(&id).await,
            Err(StoreError::JobNotFound(_))
        ));
        assert!(matches!(
            store.get_blob(&id).await,
            Err(StoreError::BlobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_blob_twice_is_a_no_op() {
        let store = MemoryJobStore::new();
        let id = JobId::new();
        store.put_blob(&id, b"%PDF-1.5").await.expect("put");
        assert_eq!(store.get_blob(&id).await.expect("blob"), b"%PDF-1.5");

        store.delete_blob(&id).await.expect("first delete");
        store.delete_blob(&id).await.expect("second delete");
        assert!(!store.has_blob(&id).await);
    }
}
