//! Durable proposal history
//!
//! Fjall-backed log of every conversion a user has run: filenames, sizes,
//! outcome, extracted data and the generated document's filename. Unlike
//! the in-memory upload registry, this survives restarts — it is the
//! service's long-term record and the authority for download access checks.
//!
//! Retention is time-based: records older than the configured TTL are
//! removed by [`HistoryStore::prune_expired`].

pub mod error;
pub mod partitions;
pub mod pruning;
pub mod store;

pub use error::{HistoryError, Result};
pub use pruning::PruneStats;
pub use store::{HistoryPage, HistoryStore, ProposalRecord, ProposalStatus};
