use std::{env, time::Duration};

use pdf_digest::{
    connection,
    jobs::{JobId, JobStatus},
    queue::{QueueEntry, RedisWorkQueue, WorkQueue},
    store::{JobStore, RedisJobStore, StoreError},
};

fn redis_url() -> String {
    env::var("REDIS_URL")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string())
}

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", JobId::new())
}

#[tokio::test]
#[ignore = "Requires live Redis"]
async fn live_store_round_trip() {
    let conn = connection::connect(&redis_url())
        .await
        .expect("failed to connect to Redis");
    let store = RedisJobStore::new(conn);
    store.ping().await.expect("Redis should answer PING");

    let id = JobId::new();
    store.put_blob(&id, b"%PDF-live").await.expect("put blob");
    store
        .put_status(&id, JobStatus::Pending, "", "")
        .await
        .expect("put status");

    assert_eq!(store.get_blob(&id).await.expect("get blob"), b"%PDF-live");
    assert_eq!(
        store.get_status(&id).await.expect("get status").status,
        JobStatus::Pending
    );

    store.delete_blob(&id).await.expect("delete");
    store
        .delete_blob(&id)
        .await
        .expect("second delete is a no-op");
    assert!(matches!(
        store.get_blob(&id).await,
        Err(StoreError::BlobNotFound(_))
    ));
}

#[tokio::test]
#[ignore = "Requires live Redis"]
async fn live_stream_consumer_group_cycle() {
    let conn = connection::connect(&redis_url())
        .await
        .expect("failed to connect to Redis");
    let queue = RedisWorkQueue::new(conn);
    let topic = unique("pdf-digest-live");
    let group = "live-group";

    queue.join_group(&topic, group).await.expect("create group");
    queue
        .join_group(&topic, group)
        .await
        .expect("join existing group");

    let job = JobId::new();
    let entry_id = queue
        .enqueue(&topic, &QueueEntry::new(job.clone(), "direct"))
        .await
        .expect("enqueue");

    let batch = queue
        .read_next(&topic, group, "live-consumer", Duration::from_millis(500))
        .await
        .expect("read");
    assert_eq!(batch.len(), 1, "expected the new entry");
    assert_eq!(batch[0].id, entry_id);
    assert_eq!(batch[0].entry.as_ref().expect("entry").job_id, job);
    assert_eq!(
        queue.pending(&topic, group).await.expect("pending"),
        vec![entry_id.clone()]
    );

    queue.ack(&topic, group, &entry_id).await.expect("ack");
    queue
        .ack(&topic, group, &entry_id)
        .await
        .expect("second ack");
    assert!(
        queue
            .pending(&topic, group)
            .await
            .expect("pending")
            .is_empty()
    );

    let empty = queue
        .read_next(&topic, group, "live-consumer", Duration::from_millis(100))
        .await
        .expect("read after ack");
    assert!(empty.is_empty(), "stream should have no new entries");
}
