//! API models for the SheetPress upload and status endpoints.
//!
//! The external contract:
//! - `POST /proposals` accepts raw spreadsheet bytes and answers with
//!   [`UploadAcceptedResponse`] — conversion continues in the background.
//! - `GET /uploads/{upload_id}` serves the core's
//!   [`crate::jobs::UploadStatus`] projection directly; its field names and
//!   the snake_case state strings are the wire contract.
//! - `POST /uploads/{upload_id}/cancel` answers [`CancelResponse`] —
//!   acknowledgment only, never a guarantee in-flight work already stopped.
//! - `GET /proposals` pages through the caller's history as
//!   [`HistoryListResponse`].
//!
//! The caller's identity arrives in the `X-Sheetpress-User` header; token
//! issuance and validation live in front of this service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::history::{ProposalRecord, ProposalStatus};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadAcceptedResponse {
    pub upload_id: String,
    pub proposal_id: String,
    pub label: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Pagination query for the history listing.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HistoryListResponse {
    pub items: Vec<ProposalSummary>,
    pub total: usize,
    pub pages: usize,
    pub current_page: usize,
}

/// One history entry as exposed to clients.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProposalSummary {
    pub id: String,
    pub original_filename: String,
    pub status: ProposalStatus,
    pub file_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_secs: Option<f64>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProposalRecord> for ProposalSummary {
    fn from(record: ProposalRecord) -> Self {
        Self {
            id: record.id,
            original_filename: record.original_filename,
            status: record.status,
            file_size: record.file_size,
            file_url: record
                .output_file
                .map(|filename| format!("/downloads/{filename}")),
            processing_secs: record.processing_secs,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
