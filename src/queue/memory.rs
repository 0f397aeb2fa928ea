//! In-process work queue with consumer-group semantics, used by tests and single-process runs.

use super::{Delivery, EntryId, QueueEntry, QueueError, WorkQueue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// Work queue emulating a stream with consumer groups.
///
/// Each group keeps a cursor over the log and a pending list of delivered, unacknowledged
/// entries. An entry is handed to exactly one consumer per group.
#[derive(Default)]
pub struct MemoryWorkQueue {
    inner: Mutex<Inner>,
    appended: Notify,
}

#[derive(Default)]
struct Inner {
    topics: HashMap<String, Topic>,
    next_sequence: u64,
}

#[derive(Default)]
struct Topic {
    log: Vec<(EntryId, QueueEntry)>,
    groups: HashMap<String, Group>,
}

#[derive(Default)]
struct Group {
    cursor: usize,
    pending: Vec<(EntryId, String)>,
}

impl MemoryWorkQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries ever appended to the topic.
    pub async fn len(&self, topic: &str) -> usize {
        let guard = self.inner.lock().await;
        guard.topics.get(topic).map_or(0, |topic| topic.log.len())
    }

    /// Consumer currently holding a pending entry, if any.
    pub async fn pending_owner(
        &self,
        topic: &str,
        group: &str,
        entry_id: &EntryId,
    ) -> Option<String> {
        let guard = self.inner.lock().await;
        guard
            .topics
            .get(topic)?
            .groups
            .get(group)?
            .pending
            .iter()
            .find(|(id, _)| id == entry_id)
            .map(|(_, consumer)| consumer.clone())
    }

    async fn try_claim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
    ) -> Result<Option<Delivery>, QueueError> {
        let mut guard = self.inner.lock().await;
        let no_group = || QueueError::NoGroup {
            topic: topic.to_string(),
            group: group.to_string(),
        };
        let stream = guard.topics.get_mut(topic).ok_or_else(no_group)?;
        let Topic { log, groups } = stream;
        let state = groups.get_mut(group).ok_or_else(no_group)?;

        let Some((id, entry)) = log.get(state.cursor).cloned() else {
            return Ok(None);
        };
        state.cursor += 1;
        state.pending.push((id.clone(), consumer.to_string()));
        Ok(Some(Delivery {
            id,
            entry: Ok(entry),
        }))
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    async fn enqueue(&self, topic: &str, entry: &QueueEntry) -> Result<EntryId, QueueError> {
        let id = {
            let mut guard = self.inner.lock().await;
            guard.next_sequence += 1;
            let id = EntryId::new(format!("{}-0", guard.next_sequence));
            guard
                .topics
                .entry(topic.to_string())
                .or_default()
                .log
                .push((id.clone(), entry.clone()));
            id
        };
        self.appended.notify_waiters();
        tracing::debug!(topic, job_id = %entry.job_id, entry_id = %id, "Added entry to stream");
        Ok(id)
    }

    async fn join_group(&self, topic: &str, group: &str) -> Result<(), QueueError> {
        let mut guard = self.inner.lock().await;
        guard
            .topics
            .entry(topic.to_string())
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn read_next(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        block_timeout: Duration,
    ) -> Result<Vec<Delivery>, QueueError> {
        let deadline = Instant::now() + block_timeout;
        loop {
            // Register interest before checking the log so an append between the check and the
            // wait still wakes this reader.
            let appended = self.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            if let Some(delivery) = self.try_claim(topic, group, consumer).await? {
                return Ok(vec![delivery]);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            if tokio::time::timeout(deadline - now, appended)
                .await
                .is_err()
            {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, topic: &str, group: &str, entry_id: &EntryId) -> Result<(), QueueError> {
        let mut guard = self.inner.lock().await;
        if let Some(state) = guard
            .topics
            .get_mut(topic)
            .and_then(|topic| topic.groups.get_mut(group))
        {
            state.pending.retain(|(id, _)| id != entry_id);
        }
        Ok(())
    }

    async fn pending(&self, topic: &str, group: &str) -> Result<Vec<EntryId>, QueueError> {
        let guard = self.inner.lock().await;
        let state = guard
            .topics
            .get(topic)
            .and_then(|topic| topic.groups.get(group))
            .ok_or_else(|| QueueError::NoGroup {
                topic: topic.to_string(),
                group: group.to_string(),
            })?;
        Ok(state.pending.iter().map(|(id, _)| id.clone()).collect())
    }
}
