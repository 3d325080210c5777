use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::documents::CellValue;

use super::error::Result;
use super::partitions::{
    encode_output_key, encode_proposal_key, encode_user_key, encode_user_prefix,
};
use super::pruning::{PruneStats, prune_expired};

/// Lifecycle of a proposal conversion as recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Error,
}

/// One proposal conversion, durable across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub id: String,
    pub user: String,
    pub filename: String,
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: String,
    pub status: ProposalStatus,
    #[serde(default)]
    pub data: Option<BTreeMap<String, CellValue>>,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub processing_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProposalRecord {
    pub fn new(id: &str, user: &str, filename: &str, original_filename: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            user: user.to_string(),
            filename: filename.to_string(),
            original_filename: original_filename.to_string(),
            file_size: 0,
            mime_type: String::new(),
            status: ProposalStatus::Pending,
            data: None,
            output_file: None,
            processing_secs: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One page of a user's history listing.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub items: Vec<ProposalRecord>,
    pub total: usize,
    pub pages: usize,
    pub current_page: usize,
}

/// Fjall-backed history of proposal conversions.
///
/// Holds the durable per-user log the in-memory upload registry does not:
/// what was converted, when, by whom, with what outcome. Lookup by output
/// filename backs download authorization.
#[derive(Clone)]
pub struct HistoryStore {
    keyspace: Keyspace,
    proposals: PartitionHandle,
    by_user: PartitionHandle,
    by_output: PartitionHandle,
    metadata: PartitionHandle,
}

impl HistoryStore {
    /// Open or create a history store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening history store");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let proposals = keyspace.open_partition("proposals", PartitionCreateOptions::default())?;
        let by_user = keyspace.open_partition("by_user", PartitionCreateOptions::default())?;
        let by_output = keyspace.open_partition("by_output", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            proposals,
            by_user,
            by_output,
            metadata,
        })
    }

    /// Store or update a proposal record, refreshing its indexes.
    pub fn upsert(&self, record: &ProposalRecord) -> Result<()> {
        let value = serde_json::to_vec(record)?;
        self.proposals.insert(encode_proposal_key(&record.id), value)?;

        // The user index key is derived from the immutable creation time,
        // so re-inserting on update is idempotent.
        self.by_user.insert(
            encode_user_key(&record.user, record.created_at, &record.id),
            record.id.as_bytes(),
        )?;

        if let Some(output_file) = &record.output_file {
            self.by_output
                .insert(encode_output_key(output_file), record.id.as_bytes())?;
        }

        debug!(proposal_id = %record.id, status = ?record.status, "history record upserted");
        Ok(())
    }

    /// Fetch a proposal record by id.
    pub fn get(&self, id: &str) -> Result<Option<ProposalRecord>> {
        match self.proposals.get(encode_proposal_key(id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Resolve the record that produced a given output file.
    pub fn find_by_output(&self, filename: &str) -> Result<Option<ProposalRecord>> {
        match self.by_output.get(encode_output_key(filename))? {
            Some(id) => self.get(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    /// A user's history, newest first.
    ///
    /// `page` is 1-based; `per_page` is clamped to 1..=100.
    pub fn list_for_user(&self, user: &str, page: usize, per_page: usize) -> Result<HistoryPage> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut ids = Vec::new();
        for item in self.by_user.prefix(encode_user_prefix(user)) {
            let (_, id) = item?;
            ids.push(String::from_utf8_lossy(&id).to_string());
        }

        let total = ids.len();
        let pages = total.div_ceil(per_page);

        let mut items = Vec::new();
        let skipped = (page - 1).saturating_mul(per_page);
        for id in ids.into_iter().skip(skipped).take(per_page) {
            if let Some(record) = self.get(&id)? {
                items.push(record);
            }
        }

        Ok(HistoryPage {
            items,
            total,
            pages,
            current_page: page,
        })
    }

    /// Remove records older than the retention window.
    pub fn prune_expired(&self, ttl_days: u32) -> Result<PruneStats> {
        let stats = prune_expired(
            &self.keyspace,
            &self.proposals,
            &self.by_user,
            &self.by_output,
            &self.metadata,
            ttl_days,
        )?;
        info!(pruned = stats.records_pruned, ttl_days, "history pruning finished");
        Ok(stats)
    }

    /// Persist all pending writes to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Verify the store is readable.
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(b"meta:last_prune")?;
        Ok(())
    }
}
