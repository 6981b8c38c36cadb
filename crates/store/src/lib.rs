//! SQLite-backed idempotency store.
//!
//! Persists one [`TransferRecord`] per distinct file key so repeated runs
//! against the same destination skip everything already transferred. The
//! table survives crashes and process restarts; its statuses (`uploaded`,
//! `dry_run`, `error`) are a stable contract with earlier versions of the
//! database file.

mod sqlite;

pub use sqlite::SqliteStore;

use ferry_pipeline::TransferStatus;

/// One persisted row of the transfer ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub file_key: String,
    pub file_size: i64,
    pub content_hash: String,
    pub status: TransferStatus,
    pub error: Option<String>,
}
