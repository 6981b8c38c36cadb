//! Data types for the transfer pipeline.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of concurrently active workers.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Default pause between the dedupe decision and the relay of an item.
pub const DEFAULT_RELAY_DELAY: Duration = Duration::from_secs(2);

/// A single file object to transfer, as produced by a [`Lister`](crate::Lister).
///
/// `key` doubles as the staging-relative path of the local copy, so it must
/// pass [`validate_item_key`](crate::validate_item_key) before any worker
/// touches it. `declared_size` is the lister's size claim; workers trust the
/// fetched byte count over it everywhere except the error path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub key: String,
    pub declared_size: u64,
}

impl ItemDescriptor {
    pub fn new(key: impl Into<String>, declared_size: u64) -> Self {
        Self {
            key: key.into(),
            declared_size,
        }
    }
}

/// Status persisted with a transfer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// The item was relayed to the destination.
    Uploaded,
    /// A dry run fetched and hashed the item without relaying it.
    DryRun,
    /// The transfer failed; the record never matches future lookups.
    Error,
}

impl TransferStatus {
    /// Stable string form used in the persistent store.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Uploaded => "uploaded",
            TransferStatus::DryRun => "dry_run",
            TransferStatus::Error => "error",
        }
    }

    /// Parses the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(TransferStatus::Uploaded),
            "dry_run" => Some(TransferStatus::DryRun),
            "error" => Some(TransferStatus::Error),
            _ => None,
        }
    }
}

/// Immutable per-run configuration, handed to the scheduler at construction.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum number of items in flight at once.
    pub concurrency: usize,
    /// Pause before each relay. Gives the destination breathing room
    /// between consecutive uploads.
    pub relay_delay: Duration,
    /// Fetch and hash items but never contact the destination.
    pub dry_run: bool,
    /// Delete the staged local copy once its outcome is recorded.
    pub auto_cleanup: bool,
    /// Directory that holds staged local copies during a run.
    pub staging_dir: PathBuf,
    /// Optional per-operation deadline for fetch and relay.
    /// `None` leaves transport operations unbounded.
    pub transfer_timeout: Option<Duration>,
}

impl RunConfig {
    /// Creates a config with defaults for everything but the staging dir.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            relay_delay: DEFAULT_RELAY_DELAY,
            dry_run: false,
            auto_cleanup: true,
            staging_dir: staging_dir.into(),
            transfer_timeout: None,
        }
    }
}

/// Terminal state of one item at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Relayed to the destination and recorded.
    Uploaded,
    /// Deduplicated against an existing record; nothing relayed.
    Skipped,
    /// Recorded as fetched and hashed, destination untouched.
    DryRun,
    /// The item errored; an error record marks it for re-attempt.
    Failed,
    /// The run was cancelled before this item finished. No record written.
    Cancelled,
}

/// Outcome of a single item transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub key: String,
    pub status: ItemStatus,
    /// Actual bytes fetched, or 0 when the item never completed a fetch.
    pub bytes: u64,
    pub error: Option<String>,
}

impl ItemOutcome {
    pub(crate) fn cancelled(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: ItemStatus::Cancelled,
            bytes: 0,
            error: None,
        }
    }
}

/// Totals for one run. Mutated only by successful relays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub files_transferred: u64,
    pub bytes_transferred: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Wall-clock duration of the run in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        let millis = (self.finished_at - self.started_at).num_milliseconds();
        millis.max(0) as f64 / 1000.0
    }

    /// Average successful-transfer throughput in bytes/second.
    ///
    /// Returns 0.0 for an instantaneous or empty run.
    pub fn average_throughput(&self) -> f64 {
        let secs = self.elapsed_seconds();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes_transferred as f64 / secs
    }
}

/// Everything a finished run reports: totals plus one outcome per item.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub summary: RunSummary,
    pub outcomes: Vec<ItemOutcome>,
}

impl RunReport {
    /// Number of items that ended in [`ItemStatus::Failed`].
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ItemStatus::Failed)
            .count()
    }
}
