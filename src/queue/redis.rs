//! Redis Streams implementation of the work queue.

use super::{Delivery, EntryId, QueueEntry, QueueError, WorkQueue};
use ::redis::Value;
use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Upper bound on entries returned by a single `XPENDING` call.
const PENDING_SCAN_LIMIT: usize = 1_000;

/// Work queue backed by a Redis stream and consumer group.
///
/// Blocking reads hold the connection for up to the block timeout, so the worker should give
/// the queue its own connection rather than share the job store's.
#[derive(Clone)]
pub struct RedisWorkQueue {
    connection: ConnectionManager,
}

impl RedisWorkQueue {
    /// Wrap an established connection manager.
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    async fn enqueue(&self, topic: &str, entry: &QueueEntry) -> Result<EntryId, QueueError> {
        let mut conn = self.connection.clone();
        let mut cmd = ::redis::cmd("XADD");
        cmd.arg(topic).arg("*");
        for (field, value) in entry.to_fields() {
            cmd.arg(field).arg(value);
        }
        let id: String = cmd.query_async(&mut conn).await?;
        tracing::info!(
            topic,
            job_id = %entry.job_id,
            entry_id = %id,
            "Added entry to stream"
        );
        Ok(EntryId::new(id))
    }

    async fn join_group(&self, topic: &str, group: &str) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        let result: ::redis::RedisResult<()> = ::redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(topic)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => {
                tracing::info!(topic, group, "Created consumer group");
                Ok(())
            }
            Err(error) if error.to_string().contains("BUSYGROUP") => {
                tracing::info!(topic, group, "Consumer group already exists");
                Ok(())
            }
            Err(error) => Err(QueueError::GroupCreation {
                topic: topic.to_string(),
                group: group.to_string(),
                reason: error.to_string(),
            }),
        }
    }

    async fn read_next(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        block_timeout: Duration,
    ) -> Result<Vec<Delivery>, QueueError> {
        let mut conn = self.connection.clone();
        // ">" asks only for entries never delivered to another consumer of this group.
        let reply: Value = ::redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block_timeout.as_millis() as u64)
            .arg("STREAMS")
            .arg(topic)
            .arg(">")
            .query_async(&mut conn)
            .await
            .map_err(|error| {
                if error.to_string().contains("NOGROUP") {
                    QueueError::NoGroup {
                        topic: topic.to_string(),
                        group: group.to_string(),
                    }
                } else {
                    QueueError::from(error)
                }
            })?;
        parse_read_reply(reply)
    }

    async fn ack(&self, topic: &str, group: &str, entry_id: &EntryId) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        let acked: i64 = ::redis::cmd("XACK")
            .arg(topic)
            .arg(group)
            .arg(entry_id.as_str())
            .query_async(&mut conn)
            .await?;
        tracing::debug!(topic, group, entry_id = %entry_id, acked, "Acknowledged entry");
        Ok(())
    }

    async fn pending(&self, topic: &str, group: &str) -> Result<Vec<EntryId>, QueueError> {
        let mut conn = self.connection.clone();
        let reply: Value = ::redis::cmd("XPENDING")
            .arg(topic)
            .arg(group)
            .arg("-")
            .arg("+")
            .arg(PENDING_SCAN_LIMIT)
            .query_async(&mut conn)
            .await?;
        parse_pending_reply(reply)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(text) => Some(text.clone()),
        _ => None,
    }
}

fn unexpected(context: &str, value: &Value) -> QueueError {
    QueueError::UnexpectedResponse(format!("{context}: {value:?}"))
}

/// Decode an `XREADGROUP` reply: `[[stream, [[id, [field, value, ...]], ...]], ...]`.
///
/// `Nil` is the timeout reply and decodes to an empty batch.
pub(crate) fn parse_read_reply(reply: Value) -> Result<Vec<Delivery>, QueueError> {
    let streams = match reply {
        Value::Nil => return Ok(Vec::new()),
        Value::Array(streams) => streams,
        other => return Err(unexpected("XREADGROUP reply", &other)),
    };

    let mut deliveries = Vec::new();
    for stream in streams {
        let Value::Array(stream_data) = &stream else {
            return Err(unexpected("stream element", &stream));
        };
        let Some(Value::Array(messages)) = stream_data.get(1) else {
            continue;
        };
        for message in messages {
            let Value::Array(parts) = message else {
                return Err(unexpected("stream message", message));
            };
            let id = parts
                .first()
                .and_then(value_to_string)
                .ok_or_else(|| unexpected("stream message id", message))?;
            let fields = match parts.get(1) {
                Some(Value::Array(raw)) => decode_fields(raw),
                _ => HashMap::new(),
            };
            deliveries.push(Delivery {
                id: EntryId::new(id),
                entry: QueueEntry::from_fields(&fields),
            });
        }
    }
    Ok(deliveries)
}

fn decode_fields(raw: &[Value]) -> HashMap<String, String> {
    raw.chunks(2)
        .filter_map(|pair| match pair {
            [key, value] => Some((value_to_string(key)?, value_to_string(value)?)),
            _ => None,
        })
        .collect()
}

/// Decode the extended `XPENDING` reply: `[[id, consumer, idle_ms, deliveries], ...]`.
pub(crate) fn parse_pending_reply(reply: Value) -> Result<Vec<EntryId>, QueueError> {
    let rows = match reply {
        Value::Nil => return Ok(Vec::new()),
        Value::Array(rows) => rows,
        other => return Err(unexpected("XPENDING reply", &other)),
    };
    rows.iter()
        .map(|row| match row {
            Value::Array(columns) => columns
                .first()
                .and_then(value_to_string)
                .map(EntryId::new)
                .ok_or_else(|| unexpected("pending row", row)),
            other => Err(unexpected("pending row", other)),
        })
        .collect()
}
