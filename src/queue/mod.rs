//! Work queue: an append-only log with consumer groups and per-entry acknowledgment.

pub mod memory;
pub mod redis;
pub mod types;

pub use self::memory::MemoryWorkQueue;
pub use self::redis::RedisWorkQueue;
pub use self::types::{Delivery, EntryId, MalformedEntry, QueueEntry, QueueError};

use async_trait::async_trait;
use std::time::Duration;

/// Durable queue contract used by producers and workers.
///
/// Delivery is at-least-once: an entry claimed by a consumer that never acknowledges it stays
/// pending for the group. Pending entries are never reclaimed here.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append an entry; returns once the log has accepted it.
    async fn enqueue(&self, topic: &str, entry: &QueueEntry) -> Result<EntryId, QueueError>;

    /// Create the consumer group (and the topic when missing). Joining an existing group succeeds.
    async fn join_group(&self, topic: &str, group: &str) -> Result<(), QueueError>;

    /// Wait up to `block_timeout` for entries not yet delivered to any consumer of the group.
    /// Returns an empty batch on timeout.
    async fn read_next(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        block_timeout: Duration,
    ) -> Result<Vec<Delivery>, QueueError>;

    /// Mark an entry handled for the group. Acknowledging twice is a no-op.
    async fn ack(&self, topic: &str, group: &str, entry_id: &EntryId) -> Result<(), QueueError>;

    /// Entries delivered to the group but not yet acknowledged, oldest first.
    async fn pending(&self, topic: &str, group: &str) -> Result<Vec<EntryId>, QueueError>;
}
