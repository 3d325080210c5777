use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("upload id already tracked: {0}")]
    DuplicateId(String),
}

/// Lifecycle states of a tracked upload.
///
/// `Cancelled`, `Completed` and `Failed` are terminal: once a record reaches
/// one of them, no further transition is accepted and progress/error updates
/// become no-ops. In-flight updates racing a terminal write must never
/// resurrect a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Retrying,
    Cancelled,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }
}

/// Cooperative cancellation flag bound to one upload record.
///
/// Single-writer, single-reader: [`JobRegistry::cancel`] sets it, the chunk
/// processor loop owning the upload polls it at chunk boundaries. Flags for
/// different uploads are independent.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Snapshot of one tracked upload.
///
/// The registry owns the live records; callers only ever receive clones, so
/// a reader can never observe a torn write from a worker thread.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub total_size: u64,
    pub processed_size: u64,
    pub progress_percent: f64,
    pub state: JobState,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

/// Read-only projection served to polling clients.
///
/// Byte counts stay internal; percent is the public unit. Field names are
/// the wire contract for `GET /uploads/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadStatus {
    pub id: String,
    pub label: String,
    pub state: JobState,
    pub progress_percent: f64,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

struct JobEntry {
    record: JobRecord,
    cancel: CancelFlag,
}

/// Process-wide registry of in-flight uploads.
///
/// One coarse lock guards the map; every operation is an O(1) mutation, and
/// the lock is never held across sleeps or chunk reads. The registry is a
/// lifecycle-scoped cache: records accumulate for the process lifetime and
/// are not persisted (the durable history store is the long-term record).
#[derive(Default)]
pub struct JobRegistry {
    uploads: Mutex<HashMap<String, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobEntry>> {
        self.uploads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new record in `Pending` state and return its cancel flag.
    ///
    /// Fails loudly on a duplicate id so a live record can never be replaced
    /// mid-poll.
    pub fn create(
        &self,
        id: &str,
        label: &str,
        total_size: u64,
    ) -> Result<CancelFlag, RegistryError> {
        let mut uploads = self.lock();
        if uploads.contains_key(id) {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }

        let cancel = CancelFlag::new();
        uploads.insert(
            id.to_string(),
            JobEntry {
                record: JobRecord {
                    id: id.to_string(),
                    label: label.to_string(),
                    started_at: Utc::now(),
                    total_size,
                    processed_size: 0,
                    progress_percent: 0.0,
                    state: JobState::Pending,
                    retry_count: 0,
                    last_error: None,
                },
                cancel: cancel.clone(),
            },
        );
        debug!(upload_id = id, label, total_size, "upload tracked");
        Ok(cancel)
    }

    /// The cancel flag bound to an upload, if it is tracked.
    pub fn cancel_flag(&self, id: &str) -> Option<CancelFlag> {
        self.lock().get(id).map(|entry| entry.cancel.clone())
    }

    /// Record progress and recompute the derived percentage.
    ///
    /// No-op for unknown ids and terminal records. The processor may report
    /// more bytes than `total_size` if the source misreported its length;
    /// the registry applies the update as given.
    pub fn update_progress(&self, id: &str, processed_size: u64) {
        let mut uploads = self.lock();
        let Some(entry) = uploads.get_mut(id) else {
            return;
        };
        if entry.record.state.is_terminal() {
            return;
        }
        entry.record.processed_size = processed_size;
        entry.record.progress_percent = if entry.record.total_size > 0 {
            processed_size as f64 / entry.record.total_size as f64 * 100.0
        } else {
            0.0
        };
    }

    /// Transition an upload's state, optionally recording a failure message.
    ///
    /// No-op for unknown ids and records already in a terminal state.
    /// `last_error` is overwritten on each failure and never cleared.
    pub fn set_state(&self, id: &str, state: JobState, error: Option<&str>) {
        let mut uploads = self.lock();
        let Some(entry) = uploads.get_mut(id) else {
            return;
        };
        if entry.record.state.is_terminal() {
            return;
        }
        entry.record.state = state;
        if let Some(message) = error {
            entry.record.last_error = Some(message.to_string());
        }
    }

    /// Count one consumed retry. No-op for unknown ids and terminal records.
    pub fn increment_retry(&self, id: &str) {
        let mut uploads = self.lock();
        let Some(entry) = uploads.get_mut(id) else {
            return;
        };
        if entry.record.state.is_terminal() {
            return;
        }
        entry.record.retry_count += 1;
    }

    /// Snapshot of a tracked upload.
    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.lock().get(id).map(|entry| entry.record.clone())
    }

    /// Status projection for polling clients.
    pub fn status(&self, id: &str) -> Option<UploadStatus> {
        self.lock().get(id).map(|entry| UploadStatus {
            id: entry.record.id.clone(),
            label: entry.record.label.clone(),
            state: entry.record.state,
            progress_percent: entry.record.progress_percent,
            retry_count: entry.record.retry_count,
            last_error: entry.record.last_error.clone(),
        })
    }

    /// Request cancellation of an upload.
    ///
    /// Sets the record's cancel flag and immediately marks the registry state
    /// `Cancelled` so polling clients observe a terminal state without
    /// waiting for the worker thread to reach the next chunk boundary. This
    /// is a best-effort signal: work already inside a chunk callback is not
    /// interrupted, and a record already terminal is left untouched.
    ///
    /// Returns whether the id was tracked at all.
    pub fn cancel(&self, id: &str) -> bool {
        let mut uploads = self.lock();
        let Some(entry) = uploads.get_mut(id) else {
            return false;
        };
        entry.cancel.cancel();
        if !entry.record.state.is_terminal() {
            entry.record.state = JobState::Cancelled;
        }
        debug!(upload_id = id, "cancellation requested");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_starts_pending_with_zero_progress() {
        let registry = JobRegistry::new();
        registry.create("u1", "prices.csv", 1000).unwrap();

        let record = registry.get("u1").unwrap();
        assert_eq!(record.state, JobState::Pending);
        assert_eq!(record.processed_size, 0);
        assert_eq!(record.retry_count, 0);
        assert_eq!(record.progress_percent, 0.0);
        assert_eq!(record.label, "prices.csv");
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let registry = JobRegistry::new();
        registry.create("u1", "a.csv", 10).unwrap();

        let err = registry.create("u1", "b.csv", 20).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(id) if id == "u1"));
        // The original record survives.
        assert_eq!(registry.get("u1").unwrap().label, "a.csv");
    }

    #[test]
    fn progress_percent_tracks_the_ratio() {
        let registry = JobRegistry::new();
        registry.create("u1", "a.csv", 10_000).unwrap();
        registry.set_state("u1", JobState::Processing, None);

        for (processed, expected) in [(4096, 40.96), (8192, 81.92), (10_000, 100.0)] {
            registry.update_progress("u1", processed);
            let record = registry.get("u1").unwrap();
            assert_eq!(record.processed_size, processed);
            assert!((record.progress_percent - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_total_size_reports_zero_percent() {
        let registry = JobRegistry::new();
        registry.create("u1", "empty.csv", 0).unwrap();
        registry.update_progress("u1", 0);
        assert_eq!(registry.get("u1").unwrap().progress_percent, 0.0);
    }

    #[test]
    fn overrun_does_not_panic() {
        let registry = JobRegistry::new();
        registry.create("u1", "a.csv", 100).unwrap();
        registry.update_progress("u1", 250);
        assert_eq!(registry.get("u1").unwrap().processed_size, 250);
    }

    #[test]
    fn terminal_records_ignore_further_updates() {
        let registry = JobRegistry::new();
        registry.create("u1", "a.csv", 100).unwrap();
        registry.set_state("u1", JobState::Completed, None);

        registry.update_progress("u1", 50);
        registry.set_state("u1", JobState::Failed, Some("late failure"));
        registry.increment_retry("u1");

        let record = registry.get("u1").unwrap();
        assert_eq!(record.state, JobState::Completed);
        assert_eq!(record.processed_size, 0);
        assert_eq!(record.retry_count, 0);
        assert!(record.last_error.is_none());
    }

    #[test]
    fn cancel_marks_active_record_terminal() {
        let registry = JobRegistry::new();
        let flag = registry.create("u1", "a.csv", 100).unwrap();
        registry.set_state("u1", JobState::Processing, None);

        assert!(registry.cancel("u1"));
        assert!(flag.is_cancelled());
        assert_eq!(registry.get("u1").unwrap().state, JobState::Cancelled);
    }

    #[test]
    fn cancel_cannot_override_completed() {
        let registry = JobRegistry::new();
        registry.create("u1", "a.csv", 100).unwrap();
        registry.set_state("u1", JobState::Completed, None);

        assert!(registry.cancel("u1"));
        assert_eq!(registry.get("u1").unwrap().state, JobState::Completed);
    }

    #[test]
    fn cancel_of_unknown_id_reports_untracked() {
        let registry = JobRegistry::new();
        assert!(!registry.cancel("missing"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn status_projects_without_byte_counts() {
        let registry = JobRegistry::new();
        registry.create("u1", "a.csv", 200).unwrap();
        registry.set_state("u1", JobState::Processing, None);
        registry.update_progress("u1", 50);

        let status = registry.status("u1").unwrap();
        assert_eq!(status.id, "u1");
        assert_eq!(status.state, JobState::Processing);
        assert!((status.progress_percent - 25.0).abs() < 1e-9);

        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("total_size").is_none());
        assert!(json.get("processed_size").is_none());
        assert_eq!(json["state"], "processing");
    }

    #[test]
    fn last_error_is_overwritten_not_cleared() {
        let registry = JobRegistry::new();
        registry.create("u1", "a.csv", 100).unwrap();
        registry.set_state("u1", JobState::Retrying, Some("first"));
        registry.set_state("u1", JobState::Processing, None);

        let record = registry.get("u1").unwrap();
        assert_eq!(record.state, JobState::Processing);
        assert_eq!(record.last_error.as_deref(), Some("first"));
    }

    #[test]
    fn concurrent_jobs_stay_isolated() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(JobRegistry::new());
        registry.create("left", "left.csv", 1_000).unwrap();
        registry.create("right", "right.csv", 2_000).unwrap();

        let handles: Vec<_> = [("left", 1_000u64), ("right", 2_000u64)]
            .into_iter()
            .map(|(id, total)| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry.set_state(id, JobState::Processing, None);
                    for step in 1..=100u64 {
                        registry.update_progress(id, total * step / 100);
                    }
                    registry.set_state(id, JobState::Completed, None);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let left = registry.get("left").unwrap();
        let right = registry.get("right").unwrap();
        assert_eq!(left.processed_size, 1_000);
        assert_eq!(right.processed_size, 2_000);
        assert_eq!(left.state, JobState::Completed);
        assert_eq!(right.state, JobState::Completed);
    }
}
