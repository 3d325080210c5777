//! Upload tracking core
//!
//! Everything a long-running conversion needs to be observable and
//! stoppable from the outside:
//!
//! - [`JobRegistry`] — process-wide, lock-guarded map of in-flight uploads;
//!   the single shared-memory surface between worker threads and the HTTP
//!   layer. Records move through `Pending -> Processing -> {Cancelled,
//!   Completed, Failed}`, with `Retrying` interleaved by the retry policy.
//! - [`RetryPolicy`] — bounded attempts with exponential backoff around any
//!   fallible unit of work, reporting failures into the registry when an
//!   upload id is supplied.
//! - [`ChunkProcessor`] — chunked scan over a [`ByteSource`], pushing
//!   progress after every chunk and honoring the record's [`CancelFlag`] at
//!   chunk boundaries.
//!
//! The registry does not persist and is not coordinated across instances;
//! it tracks the current process only. Durable records live in
//! [`crate::history`].

pub mod processor;
pub mod registry;
pub mod retry;

pub use processor::{
    ByteSource, ChunkProcessor, DEFAULT_CHUNK_SIZE, MemorySource, ProcessError, ProcessOutcome,
};
pub use registry::{CancelFlag, JobRecord, JobRegistry, JobState, RegistryError, UploadStatus};
pub use retry::RetryPolicy;

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::cell::Cell;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[test]
    fn retried_scan_recovers_and_completes() {
        let registry = JobRegistry::new();
        let attempts = Cell::new(0u32);

        let outcome = policy()
            .run_tracked(&registry, "u1", || {
                attempts.set(attempts.get() + 1);
                let failing = attempts.get() == 1;
                ChunkProcessor::new(512).process(
                    &registry,
                    "u1",
                    "prices.csv",
                    MemorySource::new(Bytes::from(vec![b'x'; 2048])),
                    |_| {
                        if failing {
                            Err(ProcessError::Chunk("transient glitch".into()))
                        } else {
                            Ok(())
                        }
                    },
                )
            })
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Completed);
        let record = registry.get("u1").unwrap();
        assert_eq!(record.state, JobState::Completed);
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.processed_size, 2048);
        assert_eq!(
            record.last_error.as_deref(),
            Some("chunk rejected: transient glitch")
        );
    }

    #[test]
    fn exhausted_scan_ends_failed() {
        let registry = JobRegistry::new();

        let err = policy()
            .run_tracked(&registry, "u1", || {
                ChunkProcessor::new(512).process(
                    &registry,
                    "u1",
                    "prices.csv",
                    MemorySource::new(Bytes::from(vec![b'x'; 2048])),
                    |_| Err(ProcessError::Chunk("permanent".into())),
                )
            })
            .unwrap_err();

        assert!(matches!(err, ProcessError::Chunk(_)));
        let record = registry.get("u1").unwrap();
        assert_eq!(record.state, JobState::Failed);
        assert_eq!(record.retry_count, 2);
        assert_eq!(record.last_error.as_deref(), Some("chunk rejected: permanent"));
    }

    #[test]
    fn cancel_during_backoff_stops_the_next_attempt() {
        let registry = JobRegistry::new();
        let attempts = Cell::new(0u32);

        let outcome = policy()
            .run_tracked(&registry, "u1", || {
                attempts.set(attempts.get() + 1);
                if attempts.get() == 1 {
                    // First attempt dies; the client cancels while the
                    // policy is backing off.
                    let result = ChunkProcessor::new(512).process(
                        &registry,
                        "u1",
                        "prices.csv",
                        MemorySource::new(Bytes::from(vec![b'x'; 2048])),
                        |_| Err(ProcessError::Chunk("glitch".into())),
                    );
                    registry.cancel("u1");
                    result
                } else {
                    ChunkProcessor::new(512).process(
                        &registry,
                        "u1",
                        "prices.csv",
                        MemorySource::new(Bytes::from(vec![b'x'; 2048])),
                        |_| panic!("cancelled before any chunk"),
                    )
                }
            })
            .unwrap();

        assert_eq!(outcome, ProcessOutcome::Cancelled);
        assert_eq!(registry.get("u1").unwrap().state, JobState::Cancelled);
    }
}
