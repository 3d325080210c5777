//! Key layout for the history keyspace.
//!
//! Partition structure:
//! - `proposals`: prop:{id} -> ProposalRecord (JSON)
//! - `by_user`: user:{user}:{reverse_millis:020}:{id} -> id
//! - `by_output`: out:{filename} -> id
//! - `metadata`: meta:{key} -> value (string)
//!
//! The `by_user` key embeds the creation time inverted against `u64::MAX`,
//! so a plain forward prefix scan yields a user's records newest first.

use chrono::{DateTime, Utc};

/// Encode a proposal key: prop:{id}
pub fn encode_proposal_key(id: &str) -> Vec<u8> {
    format!("prop:{id}").into_bytes()
}

/// Encode a per-user index key: user:{user}:{reverse_millis:020}:{id}
pub fn encode_user_key(user: &str, created_at: DateTime<Utc>, id: &str) -> Vec<u8> {
    let reverse = u64::MAX - created_at.timestamp_millis().max(0) as u64;
    format!("user:{user}:{reverse:020}:{id}").into_bytes()
}

/// Encode a per-user prefix for range scans: user:{user}:
pub fn encode_user_prefix(user: &str) -> Vec<u8> {
    format!("user:{user}:").into_bytes()
}

/// Encode an output-file index key: out:{filename}
pub fn encode_output_key(filename: &str) -> Vec<u8> {
    format!("out:{filename}").into_bytes()
}

/// Encode a metadata key: meta:{key}
pub fn encode_meta_key(key: &str) -> Vec<u8> {
    format!("meta:{key}").into_bytes()
}
