use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing worker activity.
#[derive(Default)]
pub struct WorkerMetrics {
    entries_received: AtomicU64,
    jobs_done: AtomicU64,
    jobs_failed: AtomicU64,
    malformed_entries: AtomicU64,
    read_errors: AtomicU64,
}

impl WorkerMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a queue entry handed to this worker.
    pub fn record_entry(&self) {
        self.entries_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job that reached `done`.
    pub fn record_done(&self) {
        self.jobs_done.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job that reached `error`.
    pub fn record_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry that could not be decoded into a job.
    pub fn record_malformed(&self) {
        self.malformed_entries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed read from the work queue.
    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entries_received: self.entries_received.load(Ordering::Relaxed),
            jobs_done: self.jobs_done.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            malformed_entries: self.malformed_entries.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of worker counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Queue entries delivered to this worker since startup.
    pub entries_received: u64,
    /// Jobs that finished with status `done`.
    pub jobs_done: u64,
    /// Jobs that finished with status `error`.
    pub jobs_failed: u64,
    /// Entries acknowledged without processing because they carried no job id.
    pub malformed_entries: u64,
    /// Failed queue reads that triggered the retry backoff.
    pub read_errors: u64,
}
