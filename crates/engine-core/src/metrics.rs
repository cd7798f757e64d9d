use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    submit_attempts: AtomicU64,
    poll_attempts: AtomicU64,
    sentences_retried: AtomicU64,
    sentences_recovered: AtomicU64,
    sentences_failed: AtomicU64,
    results_folded: AtomicU64,
}

/// Operational counters for one driver; cheap to clone and share with tasks.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetricsSnapshot {
    pub submit_attempts: u64,
    pub poll_attempts: u64,
    pub sentences_retried: u64,
    pub sentences_recovered: u64,
    pub sentences_failed: u64,
    pub results_folded: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        RunMetrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_submit_attempts(&self) {
        self.inner.submit_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_poll_attempts(&self) {
        self.inner.poll_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retried(&self, count: u64) {
        self.inner
            .sentences_retried
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_recovered(&self) {
        self.inner
            .sentences_recovered
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self, count: u64) {
        self.inner.sentences_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_results_folded(&self) {
        self.inner.results_folded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RunMetricsSnapshot {
        RunMetricsSnapshot {
            submit_attempts: self.inner.submit_attempts.load(Ordering::Relaxed),
            poll_attempts: self.inner.poll_attempts.load(Ordering::Relaxed),
            sentences_retried: self.inner.sentences_retried.load(Ordering::Relaxed),
            sentences_recovered: self.inner.sentences_recovered.load(Ordering::Relaxed),
            sentences_failed: self.inner.sentences_failed.load(Ordering::Relaxed),
            results_folded: self.inner.results_folded.load(Ordering::Relaxed),
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}
