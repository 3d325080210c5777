//! Conversion worker
//!
//! One blocking task per accepted upload. The worker drives the whole
//! conversion under the retry policy: chunked scan of the payload (with
//! progress and cancellation via the upload registry), worksheet parsing,
//! cell-mapping extraction, template rendering, and the final history
//! update. Everything here is synchronous by design — chunk reads and
//! backoff sleeps block, which is why the API layer runs it via
//! `spawn_blocking`.

use std::time::Instant;

use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info};

use crate::api::state::AppState;
use crate::documents::{self, CellValue, SheetError, TemplateError, Worksheet};
use crate::history::ProposalStatus;
use crate::jobs::{ChunkProcessor, MemorySource, ProcessError, ProcessOutcome};

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("processing failed: {0}")]
    Process(#[from] ProcessError),

    #[error("worksheet invalid: {0}")]
    Sheet(#[from] SheetError),

    #[error("document generation failed: {0}")]
    Template(#[from] TemplateError),
}

/// Everything a conversion needs besides the shared state.
pub struct ConversionJob {
    pub upload_id: String,
    pub proposal_id: String,
    pub label: String,
    pub payload: Bytes,
}

enum ConversionEnd {
    Completed {
        data: std::collections::BTreeMap<String, CellValue>,
        output_file: String,
    },
    Cancelled,
}

/// Run one conversion to its terminal state.
///
/// Never panics back into the runtime: every outcome — completed, cancelled,
/// failed after retries — ends with the registry terminal and the history
/// record updated.
pub fn run_conversion(state: &AppState, job: ConversionJob) {
    let started = Instant::now();
    info!(
        upload_id = %job.upload_id,
        proposal_id = %job.proposal_id,
        label = %job.label,
        "conversion started"
    );

    update_history(state, &job.proposal_id, |record| {
        record.status = ProposalStatus::Processing;
    });

    let policy = state.config.retry.policy();
    let result = policy.run_tracked(&state.registry, &job.upload_id, || attempt(state, &job));

    let elapsed = started.elapsed().as_secs_f64();
    match result {
        Ok(ConversionEnd::Completed { data, output_file }) => {
            state.metrics.proposal_generated();
            info!(
                upload_id = %job.upload_id,
                proposal_id = %job.proposal_id,
                output_file,
                elapsed_secs = elapsed,
                "conversion completed"
            );
            update_history(state, &job.proposal_id, move |record| {
                record.status = ProposalStatus::Completed;
                record.data = Some(data);
                record.output_file = Some(output_file);
                record.processing_secs = Some(elapsed);
            });
        }
        Ok(ConversionEnd::Cancelled) => {
            state.metrics.upload_cancelled();
            info!(
                upload_id = %job.upload_id,
                proposal_id = %job.proposal_id,
                "conversion cancelled"
            );
            update_history(state, &job.proposal_id, |record| {
                record.status = ProposalStatus::Cancelled;
            });
        }
        Err(err) => {
            state.metrics.upload_failed();
            error!(
                upload_id = %job.upload_id,
                proposal_id = %job.proposal_id,
                error = %err,
                "conversion failed"
            );
            update_history(state, &job.proposal_id, |record| {
                record.status = ProposalStatus::Error;
            });
        }
    }
}

/// One retryable attempt: scan, parse, extract, render.
fn attempt(state: &AppState, job: &ConversionJob) -> Result<ConversionEnd, ConversionError> {
    let processor = ChunkProcessor::new(state.config.uploads.chunk_size.as_usize());
    let source = MemorySource::new(job.payload.clone());

    let mut buffer = Vec::with_capacity(job.payload.len());
    let outcome = processor.process(
        &state.registry,
        &job.upload_id,
        &job.label,
        source,
        |chunk| {
            // Cheap binary sniff: a NUL byte never appears in CSV text and
            // reliably flags an xlsx/zip payload smuggled past the headers.
            if chunk.contains(&0) {
                return Err(ProcessError::Chunk(
                    "payload contains binary data, expected CSV text".to_string(),
                ));
            }
            buffer.extend_from_slice(chunk);
            Ok(())
        },
    )?;

    if outcome == ProcessOutcome::Cancelled {
        return Ok(ConversionEnd::Cancelled);
    }

    let worksheet = Worksheet::parse(&buffer)?;
    let data = documents::extract(&worksheet, &state.config.documents.mapping)?;

    let output_file = format!(
        "proposal_{}_{}.md",
        job.proposal_id,
        chrono::Utc::now().timestamp()
    );
    documents::generate_document(
        &state.config.documents.template_path,
        &state.config.documents.output_dir.join(&output_file),
        &data,
    )?;

    Ok(ConversionEnd::Completed { data, output_file })
}

fn update_history<F>(state: &AppState, proposal_id: &str, mutate: F)
where
    F: FnOnce(&mut crate::history::ProposalRecord),
{
    let loaded = match state.history.get(proposal_id) {
        Ok(Some(record)) => Some(record),
        Ok(None) => {
            error!(proposal_id, "history record vanished mid-conversion");
            None
        }
        Err(err) => {
            error!(proposal_id, error = %err, "history read failed");
            None
        }
    };

    if let Some(mut record) = loaded {
        mutate(&mut record);
        record.updated_at = chrono::Utc::now();
        if let Err(err) = state.history.upsert(&record) {
            error!(proposal_id, error = %err, "history update failed");
        }
    }
}
