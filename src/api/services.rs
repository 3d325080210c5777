use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use http_body_util::BodyExt;
use uuid::Uuid;

use super::models::{
    CancelResponse, HistoryListResponse, HistoryQuery, ProposalSummary, UploadAcceptedResponse,
};
use super::state::AppState;
use crate::api::error::ApiError;
use crate::history::ProposalRecord;
use crate::worker;

/// Primary upload endpoint (POST /proposals)
///
/// Accepts raw spreadsheet bytes and starts a tracked background
/// conversion. The flow:
/// 1. Validate headers (Content-Type, user identity, optional filename)
/// 2. Read the body (gzip already undone by the decompression layer),
///    enforce the configured size limit
/// 3. Mint v7 ids for the upload job and the history record
/// 4. Persist the initial history record (`pending`) and register the
///    upload in the job registry
/// 5. Hand the payload to a blocking conversion worker
/// 6. Answer 202 Accepted — clients poll `GET /uploads/{upload_id}`
///
/// The conversion itself — chunked scan, extraction, rendering — happens on
/// the worker thread under the retry policy; nothing here waits for it.
pub async fn create_proposal(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    super::utils::parse_content_type(content_type)?;

    let user = require_user(&headers)?;

    let original_filename = headers
        .get("X-Sheetpress-Filename")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or("upload.csv")
        .to_string();

    let filename = super::utils::sanitize_filename(&original_filename);
    if !super::utils::has_allowed_extension(&filename, &state.config.uploads.allowed_extensions) {
        return Err(ApiError::InvalidPayload(format!(
            "unsupported spreadsheet extension in '{filename}' (allowed: {})",
            state.config.uploads.allowed_extensions.join(", ")
        )));
    }

    let payload = read_body(body, state.config.uploads.max_upload_bytes.as_usize()).await?;

    let upload_id = Uuid::now_v7().to_string();
    let proposal_id = Uuid::now_v7().to_string();

    let mut record = ProposalRecord::new(&proposal_id, &user, &filename, &original_filename);
    record.file_size = payload.len() as u64;
    record.mime_type = content_type.to_string();
    state
        .history
        .upsert(&record)
        .map_err(|err| ApiError::Internal(format!("failed to record proposal: {err}")))?;

    // Register the upload before answering so the id returned in the 202
    // immediately resolves on the status endpoint; the worker's processor
    // adopts this record instead of creating its own.
    state
        .registry
        .create(&upload_id, &original_filename, payload.len() as u64)
        .map_err(|err| ApiError::Internal(format!("failed to track upload: {err}")))?;

    state.metrics.upload_accepted();
    tracing::info!(
        upload_id,
        proposal_id,
        user,
        size = payload.len(),
        "upload accepted, conversion queued"
    );

    // Chunk reads and backoff sleeps block, so the conversion lives on a
    // blocking worker thread; the handler returns immediately.
    let worker_state = state.clone();
    let job = worker::ConversionJob {
        upload_id: upload_id.clone(),
        proposal_id: proposal_id.clone(),
        label: original_filename.clone(),
        payload,
    };
    tokio::task::spawn_blocking(move || worker::run_conversion(&worker_state, job));

    let response = UploadAcceptedResponse {
        upload_id,
        proposal_id,
        label: original_filename,
    };
    Ok((axum::http::StatusCode::ACCEPTED, Json(response)))
}

/// Upload status endpoint (GET /uploads/{upload_id})
///
/// Serves the registry's read-only projection. Unknown ids are a normal
/// outcome (expired process, typo) and answer 404 without error logging.
pub async fn get_upload_status(
    State(state): State<AppState>,
    axum::extract::Path(upload_id): axum::extract::Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .registry
        .status(&upload_id)
        .ok_or_else(|| ApiError::NotFound(format!("upload {upload_id}")))?;

    Ok((axum::http::StatusCode::OK, Json(status)))
}

/// Cancellation endpoint (POST /uploads/{upload_id}/cancel)
///
/// Best-effort: flips the job's cancel flag and marks the registry record
/// `cancelled` so pollers immediately observe a terminal state. Work
/// already inside a chunk callback finishes that chunk first. The call is
/// acknowledged even for unknown or already-terminal ids.
pub async fn cancel_upload(
    State(state): State<AppState>,
    axum::extract::Path(upload_id): axum::extract::Path<String>,
) -> impl IntoResponse {
    let tracked = state.registry.cancel(&upload_id);
    tracing::info!(upload_id, tracked, "cancellation requested");

    (axum::http::StatusCode::OK, Json(CancelResponse { cancelled: true }))
}

/// History listing endpoint (GET /proposals?page&per_page)
pub async fn list_proposals(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::extract::Query(query): axum::extract::Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers)?;

    let page = state
        .history
        .list_for_user(&user, query.page.unwrap_or(1), query.per_page.unwrap_or(10))
        .map_err(|err| ApiError::Internal(format!("failed to list proposals: {err}")))?;

    let response = HistoryListResponse {
        items: page.items.into_iter().map(ProposalSummary::from).collect(),
        total: page.total,
        pages: page.pages,
        current_page: page.current_page,
    };
    Ok((axum::http::StatusCode::OK, Json(response)))
}

/// Document download endpoint (GET /downloads/{filename})
///
/// Only the user whose conversion produced the file may fetch it.
pub async fn download_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::extract::Path(filename): axum::extract::Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = require_user(&headers)?;

    if filename.contains(['/', '\\']) || filename.contains("..") {
        return Err(ApiError::NotFound(format!("file {filename}")));
    }

    let record = state
        .history
        .find_by_output(&filename)
        .map_err(|err| ApiError::Internal(format!("history lookup failed: {err}")))?
        .ok_or_else(|| ApiError::NotFound(format!("file {filename}")))?;

    if record.user != user {
        return Err(ApiError::Forbidden(format!("file {filename}")));
    }

    let path = state.config.documents.output_dir.join(&filename);
    let contents = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::NotFound(format!("file {filename}")))?;

    let headers = [
        (axum::http::header::CONTENT_TYPE, "text/markdown".to_string()),
        (
            axum::http::header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((axum::http::StatusCode::OK, headers, contents))
}

/// Health check endpoint (GET /health)
///
/// Reports per-component health; 503 if anything is down.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    use std::collections::HashMap;

    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());

    let history = match state.history.health_check() {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };
    components.insert("history".to_string(), history.to_string());

    let template = if state.config.documents.template_path.is_file() {
        "healthy"
    } else {
        "unhealthy"
    };
    components.insert("template".to_string(), template.to_string());

    let all_healthy = components.values().all(|status| status == "healthy");
    let status_code = if all_healthy {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    let response = super::models::HealthResponse {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get("X-Sheetpress-User")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::InvalidPayload("X-Sheetpress-User header is required".to_string()))
}

async fn read_body(body: axum::body::Body, max_size: usize) -> Result<bytes::Bytes, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes();

    super::utils::validate_body_size(&data, max_size)?;
    Ok(data)
}
