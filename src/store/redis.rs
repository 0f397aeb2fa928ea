//! Redis-backed job store.
//!
//! Status lives in a hash at `job:{id}` with the fields `status`, `content` and `summary`; the
//! document bytes live in a plain string key at `job:{id}:blob`.

use super::{JobStore, StoreError};
use crate::jobs::{JobId, JobRecord, JobStatus};
use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use std::collections::HashMap;

const STATUS_FIELD: &str = "status";
const CONTENT_FIELD: &str = "content";
const SUMMARY_FIELD: &str = "summary";

/// Job store speaking to Redis through a shared connection manager.
#[derive(Clone)]
pub struct RedisJobStore {
    connection: ConnectionManager,
}

impl RedisJobStore {
    /// Wrap an established connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

pub(crate) fn status_key(id: &JobId) -> String {
    format!("job:{id}")
}

pub(crate) fn blob_key(id: &JobId) -> String {
    format!("job:{id}:blob")
}

/// Decode a `HGETALL` reply into a record. Missing text fields read as empty.
pub(crate) fn decode_record(
    id: &JobId,
    mut fields: HashMap<String, String>,
) -> Result<JobRecord, StoreError> {
    if fields.is_empty() {
        return Err(StoreError::JobNotFound(id.clone()));
    }
    let status = fields
        .remove(STATUS_FIELD)
        .ok_or_else(|| StoreError::Corrupt {
            id: id.clone(),
            reason: "missing status field".into(),
        })?
        .parse::<JobStatus>()
        .map_err(|reason| StoreError::Corrupt {
            id: id.clone(),
            reason,
        })?;
    Ok(JobRecord {
        status,
        content: fields.remove(CONTENT_FIELD).unwrap_or_default(),
        summary: fields.remove(SUMMARY_FIELD).unwrap_or_default(),
    })
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn put_status(
        &self,
        id: &JobId,
        status: JobStatus,
        content: &str,
        summary: &str,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .hset_multiple(
                status_key(id),
                &[
                    (STATUS_FIELD, status.as_str()),
                    (CONTENT_FIELD, content),
                    (SUMMARY_FIELD, summary),
                ],
            )
            .await?;
        tracing::debug!(job_id = %id, status = %status, "Updated job status");
        Ok(())
    }

    async fn get_status(&self, id: &JobId) -> Result<JobRecord, StoreError> {
        let mut conn = self.connection.clone();
        let fields: HashMap<String, String> = conn.hgetall(status_key(id)).await?;
        decode_record(id, fields)
    }

    async fn put_blob(&self, id: &JobId, bytes: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(blob_key(id), bytes).await?;
        tracing::debug!(job_id = %id, bytes = bytes.len(), "Stored document blob");
        Ok(())
    }

    async fn get_blob(&self, id: &JobId) -> Result<Vec<u8>, StoreError> {
        let mut conn = self.connection.clone();
        let blob: Option<Vec<u8>> = conn.get(blob_key(id)).await?;
        blob.ok_or_else(|| StoreError::BlobNotFound(id.clone()))
    }

    async fn delete_blob(&self, id: &JobId) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(blob_key(id)).await?;
        tracing::debug!(job_id = %id, removed, "Deleted document blob");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
