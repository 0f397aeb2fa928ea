//! Worker loop claiming queued jobs and driving them to a terminal status.
//!
//! Each entry is processed end to end before the next read: status `processing`, strategy
//! dispatch, summarization, terminal status, blob cleanup, acknowledgment. Failures inside one job
//! end in status `error` and never stop the loop; store or queue failures that escape a job leave
//! the entry pending and trigger the retry backoff.

use crate::{
    config::Config,
    extraction::{ExtractionError, Parser, StrategySet},
    jobs::{JobId, JobRecord, JobStatus},
    metrics::{MetricsSnapshot, WorkerMetrics},
    queue::{Delivery, QueueEntry, QueueError, WorkQueue},
    store::{JobStore, StoreError, put_record},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Store or queue failure that escaped a job boundary.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Work queue command failed.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// Job store command failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Queue coordinates and timing for one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Stream the worker reads from.
    pub topic: String,
    /// Consumer group shared by competing workers.
    pub group: String,
    /// Name identifying this worker inside the group.
    pub consumer: String,
    /// Upper bound for one blocking read.
    pub block_timeout: Duration,
    /// Pause after a failed iteration.
    pub retry_backoff: Duration,
}

impl WorkerSettings {
    /// Settings derived from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            topic: config.document_stream.clone(),
            group: config.consumer_group.clone(),
            consumer: config.worker.consumer_name.clone(),
            block_timeout: config.worker.block_timeout,
            retry_backoff: config.worker.retry_backoff,
        }
    }
}

/// How a single delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Job reached `done`.
    Done,
    /// Job reached `error` with the given message.
    Failed(String),
    /// Entry carried no usable job id and was acknowledged without processing.
    Malformed,
}

/// Single-consumer job processor.
pub struct Worker {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    strategies: StrategySet,
    settings: WorkerSettings,
    metrics: WorkerMetrics,
}

impl Worker {
    /// Assemble a worker from injected collaborators.
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        strategies: StrategySet,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            queue,
            strategies,
            settings,
            metrics: WorkerMetrics::new(),
        }
    }

    /// Settings this worker was built with.
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Counters accumulated since construction.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Join the consumer group and report entries left pending by earlier runs.
    pub async fn start(&self) -> Result<(), WorkerError> {
        let WorkerSettings {
            topic,
            group,
            consumer,
            ..
        } = &self.settings;
        self.queue.join_group(topic, group).await?;

        match self.queue.pending(topic, group).await {
            Ok(pending) if pending.is_empty() => {}
            Ok(pending) => tracing::warn!(
                topic = %topic,
                group = %group,
                pending = pending.len(),
                oldest = %pending[0],
                "Consumer group has unacknowledged entries; they are not reclaimed"
            ),
            Err(error) => tracing::warn!(%error, "Failed to inspect pending entries"),
        }

        tracing::info!(
            topic = %topic,
            group = %group,
            consumer = %consumer,
            "Worker joined consumer group"
        );
        Ok(())
    }

    /// Run until `shutdown` resolves, returning the final counters.
    ///
    /// Shutdown is checked between reads and during the backoff sleep. A read in progress runs up
    /// to the block timeout, and every entry it claims is processed before the loop exits.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<MetricsSnapshot, WorkerError>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                () = std::future::ready(()) => {}
            }

            if let Err(error) = self.poll_once().await {
                tracing::error!(
                    %error,
                    backoff_ms = self.settings.retry_backoff.as_millis() as u64,
                    "Worker iteration failed; backing off"
                );
                tokio::select! {
                    biased;
                    () = &mut shutdown => break,
                    () = tokio::time::sleep(self.settings.retry_backoff) => {}
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(metrics = ?snapshot, "Worker stopped");
        Ok(snapshot)
    }

    /// Read one batch and process it. Returns the number of deliveries handled.
    pub async fn poll_once(&self) -> Result<usize, WorkerError> {
        let deliveries = self.read_batch().await?;
        let count = deliveries.len();
        self.process_batch(deliveries).await?;
        Ok(count)
    }

    async fn read_batch(&self) -> Result<Vec<Delivery>, WorkerError> {
        let WorkerSettings {
            topic,
            group,
            consumer,
            block_timeout,
            ..
        } = &self.settings;
        self.queue
            .read_next(topic, group, consumer, *block_timeout)
            .await
            .map_err(|error| {
                self.metrics.record_read_error();
                WorkerError::from(error)
            })
    }

    async fn process_batch(&self, deliveries: Vec<Delivery>) -> Result<(), WorkerError> {
        for delivery in deliveries {
            self.process_delivery(delivery).await?;
        }
        Ok(())
    }

    /// Drive one delivery to a terminal status and acknowledge it.
    ///
    /// An error means the entry was left unacknowledged.
    pub async fn process_delivery(&self, delivery: Delivery) -> Result<JobOutcome, WorkerError> {
        self.metrics.record_entry();
        let outcome = match &delivery.entry {
            Ok(entry) => self.process_entry(entry).await?,
            Err(malformed) => {
                tracing::warn!(
                    entry_id = %delivery.id,
                    error = %malformed,
                    "Skipping malformed entry"
                );
                self.metrics.record_malformed();
                JobOutcome::Malformed
            }
        };

        self.queue
            .ack(&self.settings.topic, &self.settings.group, &delivery.id)
            .await?;
        tracing::debug!(entry_id = %delivery.id, "Acknowledged entry");
        Ok(outcome)
    }

    async fn process_entry(&self, entry: &QueueEntry) -> Result<JobOutcome, StoreError> {
        let id = &entry.job_id;
        tracing::info!(job_id = %id, parser = %entry.parser, "Processing job");

        if let Err(error) = self
            .store
            .put_status(id, JobStatus::Processing, "", "")
            .await
        {
            tracing::warn!(job_id = %id, %error, "Failed to mark job as processing; continuing");
        }

        let parser = match entry.parser.parse::<Parser>() {
            Ok(parser) => parser,
            Err(error) => return self.fail(id, error.to_string()).await,
        };

        let document = match self.store.get_blob(id).await {
            Ok(document) => document,
            Err(error) if error.is_not_found() => return self.fail(id, error.to_string()).await,
            Err(error) => return Err(error),
        };

        match self.run_pipeline(parser, &document).await {
            Ok((content, summary)) => {
                self.finish(id, &JobRecord::done(content, summary)).await?;
                self.metrics.record_done();
                tracing::info!(job_id = %id, parser = %parser, "Job completed");
                Ok(JobOutcome::Done)
            }
            Err(error) => {
                self.fail(id, format!("Error processing document: {error}"))
                    .await
            }
        }
    }

    async fn run_pipeline(
        &self,
        parser: Parser,
        document: &[u8],
    ) -> Result<(String, String), ExtractionError> {
        let content = self
            .strategies
            .get_parser_function(parser)
            .extract(document)
            .await?;
        let summary = self.strategies.summarizer().summarize(&content).await?;
        Ok((content, summary))
    }

    async fn fail(&self, id: &JobId, message: String) -> Result<JobOutcome, StoreError> {
        tracing::error!(job_id = %id, error = %message, "Job failed");
        self.finish(id, &JobRecord::error(message.clone())).await?;
        self.metrics.record_failed();
        Ok(JobOutcome::Failed(message))
    }

    async fn finish(&self, id: &JobId, record: &JobRecord) -> Result<(), StoreError> {
        put_record(self.store.as_ref(), id, record).await?;
        if let Err(error) = self.store.delete_blob(id).await {
            tracing::warn!(job_id = %id, %error, "Failed to delete document blob");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::test_support::{StaticModel, pdf_with_pages};
    use crate::queue::{EntryId, MalformedEntry, MemoryWorkQueue};
    use crate::store::MemoryJobStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOPIC: &str = "documents";
    const GROUP: &str = "document_processors";

    fn settings() -> WorkerSettings {
        WorkerSettings {
            topic: TOPIC.into(),
            group: GROUP.into(),
            consumer: "worker-test".into(),
            block_timeout: Duration::from_millis(20),
            retry_backoff: Duration::from_millis(30),
        }
    }

    fn strategies() -> StrategySet {
        StrategySet::new(Some(StaticModel::ok("A short summary")), None)
    }

    /// Store that rejects writes of one status and delegates everything else.
    struct RejectingStore {
        inner: MemoryJobStore,
        reject: JobStatus,
    }

    #[async_trait]
    impl JobStore for RejectingStore {
        async fn put_status(
            &self,
            id: &JobId,
            status: JobStatus,
            content: &str,
            summary: &str,
        ) -> Result<(), StoreError> {
            if status == self.reject {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.put_status(id, status, content, summary).await
        }

        async fn get_status(&self, id: &JobId) -> Result<JobRecord, StoreError> {
            self.inner.get_status(id).await
        }

        async fn put_blob(&self, id: &JobId, bytes: &[u8]) -> Result<(), StoreError> {
            self.inner.put_blob(id, bytes).await
        }

        async fn get_blob(&self, id: &JobId) -> Result<Vec<u8>, StoreError> {
            self.inner.get_blob(id).await
        }

        async fn delete_blob(&self, id: &JobId) -> Result<(), StoreError> {
            self.inner.delete_blob(id).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    /// Queue whose reads always fail.
    #[derive(Default)]
    struct BrokenQueue {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl WorkQueue for BrokenQueue {
        async fn enqueue(&self, _topic: &str, _entry: &QueueEntry) -> Result<EntryId, QueueError> {
            Err(QueueError::Unavailable("down".into()))
        }

        async fn join_group(&self, _topic: &str, _group: &str) -> Result<(), QueueError> {
            Ok(())
        }

        async fn read_next(
            &self,
            _topic: &str,
            _group: &str,
            _consumer: &str,
            _block_timeout: Duration,
        ) -> Result<Vec<Delivery>, QueueError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Err(QueueError::Unavailable("connection refused".into()))
        }

        async fn ack(&self, _topic: &str, _group: &str, _id: &EntryId) -> Result<(), QueueError> {
            Ok(())
        }

        async fn pending(&self, _topic: &str, _group: &str) -> Result<Vec<EntryId>, QueueError> {
            Ok(Vec::new())
        }
    }

    async fn submit(
        store: &dyn JobStore,
        queue: &dyn WorkQueue,
        parser: &str,
        blob: Option<&[u8]>,
    ) -> JobId {
        let id = JobId::new();
        if let Some(blob) = blob {
            store.put_blob(&id, blob).await.expect("blob");
        }
        store
            .put_status(&id, JobStatus::Pending, "", "")
            .await
            .expect("pending");
        queue
            .enqueue(TOPIC, &QueueEntry::new(id.clone(), parser))
            .await
            .expect("enqueue");
        id
    }

    #[tokio::test]
    async fn direct_job_completes_and_cleans_up() {
        let store = Arc::new(MemoryJobStore::new());
        let queue = Arc::new(MemoryWorkQueue::new());
        let worker = Worker::new(store.clone(), queue.clone(), strategies(), settings());
        worker.start().await.expect("start");

        let pdf = pdf_with_pages(&["Hello", "World"]);
        let id = submit(store.as_ref(), queue.as_ref(), "direct", Some(&pdf)).await;

        assert_eq!(worker.poll_once().await.expect("poll"), 1);

        let record = store.get_status(&id).await.expect("record");
        assert_eq!(record.status, JobStatus::Done);
        assert!(record.content.contains("--- Page 1 ---"));
        assert_eq!(record.summary, "A short summary");
        assert!(!store.has_blob(&id).await);
        assert_eq!(
            store.status_history(&id).await,
            vec![JobStatus::Pending, JobStatus::Processing, JobStatus::Done]
        );
        assert!(
            queue
                .pending(TOPIC, GROUP)
                .await
                .expect("pending")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn unknown_parser_fails_job_and_deletes_blob() {
        let store = Arc::new(MemoryJobStore::new());
        let queue = Arc::new(MemoryWorkQueue::new());
        let worker = Worker::new(store.clone(), queue.clone(), strategies(), settings());
        worker.start().await.expect("start");

        let id = submit(store.as_ref(), queue.as_ref(), "bogus", Some(b"%PDF")).await;
        worker.poll_once().await.expect("poll");

        let record = store.get_status(&id).await.expect("record");
        assert_eq!(record.status, JobStatus::Error);
        assert_eq!(record.content, "Unknown parser: bogus");
        assert_eq!(record.summary, record.content);
        assert!(!store.has_blob(&id).await);
        assert_eq!(worker.metrics().jobs_failed, 1);
    }

    #[tokio::test]
    async fn processing_write_failure_is_not_fatal() {
        let store = Arc::new(RejectingStore {
            inner: MemoryJobStore::new(),
            reject: JobStatus::Processing,
        });
        let queue = Arc::new(MemoryWorkQueue::new());
        let worker = Worker::new(store.clone(), queue.clone(), strategies(), settings());
        worker.start().await.expect("start");

        let pdf = pdf_with_pages(&["Body"]);
        let id = submit(store.as_ref(), queue.as_ref(), "direct", Some(&pdf)).await;
        worker.poll_once().await.expect("poll");

        assert_eq!(
            store.get_status(&id).await.expect("record").status,
            JobStatus::Done
        );
        assert_eq!(
            store.inner.status_history(&id).await,
            vec![JobStatus::Pending, JobStatus::Done]
        );
    }

    #[tokio::test]
    async fn terminal_write_failure_leaves_entry_pending() {
        let store = Arc::new(RejectingStore {
            inner: MemoryJobStore::new(),
            reject: JobStatus::Done,
        });
        let queue = Arc::new(MemoryWorkQueue::new());
        let worker = Worker::new(store.clone(), queue.clone(), strategies(), settings());
        worker.start().await.expect("start");

        let pdf = pdf_with_pages(&["Body"]);
        submit(store.as_ref(), queue.as_ref(), "direct", Some(&pdf)).await;

        let error = worker.poll_once().await.expect_err("terminal write failed");
        assert!(matches!(
            error,
            WorkerError::Store(StoreError::Unavailable(_))
        ));
        let pending = queue.pending(TOPIC, GROUP).await.expect("pending");
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn malformed_entry_is_acknowledged_and_counted() {
        let store = Arc::new(MemoryJobStore::new());
        let queue = Arc::new(MemoryWorkQueue::new());
        let worker = Worker::new(store, queue, strategies(), settings());

        let outcome = worker
            .process_delivery(Delivery {
                id: EntryId::new("1-0"),
                entry: Err(MalformedEntry("missing job_id field".into())),
            })
            .await
            .expect("malformed entries are acked");

        assert_eq!(outcome, JobOutcome::Malformed);
        let metrics = worker.metrics();
        assert_eq!(metrics.entries_received, 1);
        assert_eq!(metrics.malformed_entries, 1);
    }

    #[tokio::test]
    async fn failing_reads_back_off_until_shutdown() {
        let queue = Arc::new(BrokenQueue::default());
        let worker = Worker::new(
            Arc::new(MemoryJobStore::new()),
            queue.clone(),
            strategies(),
            settings(),
        );

        let snapshot = worker
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .expect("run");

        let reads = queue.reads.load(Ordering::SeqCst);
        assert!(reads >= 2, "expected repeated reads, got {reads}");
        assert!(reads <= 5, "backoff not applied, got {reads} reads");
        assert_eq!(snapshot.read_errors as usize, reads);
    }

    #[tokio::test]
    async fn shutdown_waits_for_idle_read_to_time_out() {
        let worker = Worker::new(
            Arc::new(MemoryJobStore::new()),
            Arc::new(MemoryWorkQueue::new()),
            strategies(),
            WorkerSettings {
                block_timeout: Duration::from_millis(100),
                ..settings()
            },
        );

        let snapshot = tokio::time::timeout(
            Duration::from_secs(5),
            worker.run_until(tokio::time::sleep(Duration::from_millis(20))),
        )
        .await
        .expect("worker stops once the read times out")
        .expect("run");
        assert_eq!(snapshot.entries_received, 0);
    }

    #[tokio::test]
    async fn entry_claimed_after_shutdown_is_still_processed() {
        let store = Arc::new(MemoryJobStore::new());
        let queue = Arc::new(MemoryWorkQueue::new());
        let worker = Worker::new(
            store.clone(),
            queue.clone(),
            strategies(),
            WorkerSettings {
                block_timeout: Duration::from_millis(500),
                ..settings()
            },
        );
        worker.start().await.expect("start");

        let pdf = pdf_with_pages(&["Late arrival"]);
        let producer = {
            let store = Arc::clone(&store);
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(80)).await;
                submit(store.as_ref(), queue.as_ref(), "direct", Some(&pdf)).await
            })
        };

        // Shutdown fires while the first read is blocked; the entry arrives afterwards.
        let snapshot = worker
            .run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await
            .expect("run");
        let id = producer.await.expect("producer");

        assert_eq!(snapshot.entries_received, 1);
        assert_eq!(
            store.get_status(&id).await.expect("record").status,
            JobStatus::Done
        );
        assert!(
            queue
                .pending(TOPIC, GROUP)
                .await
                .expect("pending")
                .is_empty()
        );
    }
}
