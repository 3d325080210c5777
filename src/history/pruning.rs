//! Retention pruning for the history keyspace.

use chrono::{Duration, Utc};
use fjall::{Keyspace, PartitionHandle};
use tracing::debug;

use super::error::Result;
use super::partitions::{encode_meta_key, encode_output_key, encode_user_key};
use super::store::ProposalRecord;

const META_LAST_PRUNE: &str = "last_prune";

#[derive(Debug, Default)]
pub struct PruneStats {
    pub records_pruned: usize,
}

/// Remove proposal records older than `ttl_days`, along with their index
/// entries. Values that no longer deserialize are dropped too — a record
/// the store cannot read is not worth retaining.
pub fn prune_expired(
    keyspace: &Keyspace,
    proposals: &PartitionHandle,
    by_user: &PartitionHandle,
    by_output: &PartitionHandle,
    metadata: &PartitionHandle,
    ttl_days: u32,
) -> Result<PruneStats> {
    let cutoff = Utc::now() - Duration::days(i64::from(ttl_days));
    let mut stats = PruneStats::default();

    let mut expired: Vec<(fjall::Slice, Option<ProposalRecord>)> = Vec::new();
    for item in proposals.iter() {
        let (key, value) = item?;
        match serde_json::from_slice::<ProposalRecord>(&value) {
            Ok(record) if record.created_at < cutoff => expired.push((key, Some(record))),
            Ok(_) => {}
            Err(_) => expired.push((key, None)),
        }
    }

    for (key, record) in expired {
        if let Some(record) = &record {
            by_user.remove(encode_user_key(&record.user, record.created_at, &record.id))?;
            if let Some(output_file) = &record.output_file {
                by_output.remove(encode_output_key(output_file))?;
            }
            debug!(proposal_id = %record.id, "pruned expired history record");
        }
        proposals.remove(key)?;
        stats.records_pruned += 1;
    }

    metadata.insert(
        encode_meta_key(META_LAST_PRUNE),
        Utc::now().timestamp().to_string().as_bytes(),
    )?;
    keyspace.persist(fjall::PersistMode::SyncAll)?;

    Ok(stats)
}
