//! Process-local counters for upload and conversion outcomes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    uploads_accepted: AtomicU64,
    uploads_cancelled: AtomicU64,
    uploads_failed: AtomicU64,
    proposals_generated: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload_accepted(&self) {
        self.uploads_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_accepted", "metric incremented");
    }

    pub fn upload_cancelled(&self) {
        self.uploads_cancelled.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_cancelled", "metric incremented");
    }

    pub fn upload_failed(&self) {
        self.uploads_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "uploads_failed", "metric incremented");
    }

    pub fn proposal_generated(&self) {
        self.proposals_generated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "proposals_generated", "metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uploads_accepted: self.uploads_accepted.load(Ordering::Relaxed),
            uploads_cancelled: self.uploads_cancelled.load(Ordering::Relaxed),
            uploads_failed: self.uploads_failed.load(Ordering::Relaxed),
            proposals_generated: self.proposals_generated.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub uploads_accepted: u64,
    pub uploads_cancelled: u64,
    pub uploads_failed: u64,
    pub proposals_generated: u64,
}
