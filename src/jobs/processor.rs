use std::io::{self, Cursor, Read};

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info};

use super::registry::{CancelFlag, JobRegistry, JobState, RegistryError};

/// Chunk size used when none is configured, matching the upload layer's
/// historical default.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("read failed: {0}")]
    Read(#[from] io::Error),

    #[error("chunk rejected: {0}")]
    Chunk(String),

    #[error("no record bound for upload {0}")]
    Unbound(String),
}

/// Byte input whose total length is known before the first read.
///
/// Sources that cannot report a length up front (unsized streams) are out of
/// scope and must be buffered into a [`MemorySource`] first. An empty read
/// signals end of source.
pub trait ByteSource: Read {
    fn total_size(&self) -> u64;
}

/// In-memory source over an uploaded request body.
pub struct MemorySource {
    cursor: Cursor<Bytes>,
    len: u64,
}

impl MemorySource {
    pub fn new(data: Bytes) -> Self {
        let len = data.len() as u64;
        Self {
            cursor: Cursor::new(data),
            len,
        }
    }
}

impl Read for MemorySource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl ByteSource for MemorySource {
    fn total_size(&self) -> u64 {
        self.len
    }
}

/// How a processing run ended when no error was raised.
///
/// Callers distinguish "cancelled" (a returned outcome) from "failed" (a
/// propagated error): cancellation is a normal end of work, not a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed,
    Cancelled,
}

/// Streams a byte source in bounded chunks, pushing progress into the
/// registry and honoring the record's cancel flag at every chunk boundary.
///
/// Each call creates (or, on a retry attempt, re-adopts) the job record and
/// drives it to `Processing`. A normal end of source marks `Completed`; an
/// observed cancel flag marks `Cancelled`. A failure in the read path or
/// the caller-supplied chunk callback propagates with the record left
/// non-terminal: the wrapping retry policy decides whether the failure is
/// `Retrying` or `Failed`. (Terminal states accept no transitions, so a
/// `Failed` write here would wedge the record before a retry could run.)
pub struct ChunkProcessor {
    chunk_size: usize,
}

impl ChunkProcessor {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn process<S, F>(
        &self,
        registry: &JobRegistry,
        upload_id: &str,
        label: &str,
        source: S,
        on_chunk: F,
    ) -> Result<ProcessOutcome, ProcessError>
    where
        S: ByteSource,
        F: FnMut(&[u8]) -> Result<(), ProcessError>,
    {
        let total_size = source.total_size();
        let cancel = match registry.create(upload_id, label, total_size) {
            Ok(flag) => flag,
            // A retry attempt finds the record from the previous attempt;
            // keep it, and with it the cancel flag already handed out.
            Err(RegistryError::DuplicateId(_)) => registry
                .cancel_flag(upload_id)
                .ok_or_else(|| ProcessError::Unbound(upload_id.to_string()))?,
        };
        registry.set_state(upload_id, JobState::Processing, None);
        debug!(upload_id, total_size, chunk_size = self.chunk_size, "chunked scan started");

        self.scan(registry, upload_id, &cancel, source, on_chunk)
    }

    fn scan<S, F>(
        &self,
        registry: &JobRegistry,
        upload_id: &str,
        cancel: &CancelFlag,
        mut source: S,
        mut on_chunk: F,
    ) -> Result<ProcessOutcome, ProcessError>
    where
        S: ByteSource,
        F: FnMut(&[u8]) -> Result<(), ProcessError>,
    {
        let mut buf = vec![0u8; self.chunk_size];
        let mut processed: u64 = 0;

        loop {
            // Cooperative cancellation: checked once per chunk boundary; a
            // chunk already inside the callback is not interrupted.
            if cancel.is_cancelled() {
                registry.set_state(upload_id, JobState::Cancelled, None);
                info!(upload_id, processed, "chunked scan cancelled");
                return Ok(ProcessOutcome::Cancelled);
            }

            let n = source.read(&mut buf)?;
            if n == 0 {
                break;
            }
            on_chunk(&buf[..n])?;
            processed += n as u64;
            registry.update_progress(upload_id, processed);
        }

        registry.set_state(upload_id, JobState::Completed, None);
        info!(upload_id, processed, "chunked scan completed");
        Ok(ProcessOutcome::Completed)
    }
}

impl Default for ChunkProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}
