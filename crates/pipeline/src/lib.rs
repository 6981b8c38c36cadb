//! Bounded-concurrency transfer pipeline with content-addressed dedup.
//!
//! Moves file objects from a source collection to a destination
//! collection, transferring each distinct file at most once across
//! repeated runs. A [`Scheduler`] admits at most K workers at a time;
//! each worker fetches one item to local staging, hashes it, consults
//! the [`IdempotencyStore`], and relays only what the destination has
//! never seen. Listers and transports are external collaborators
//! implemented against the traits in this crate; the SQLite store lives
//! in `ferry-store`.

mod digest;
mod error;
mod lister;
mod progress;
mod scheduler;
mod store;
mod transport;
mod types;
mod validation;
mod worker;

pub use digest::{sha256_bytes, sha256_file};
pub use error::{ListError, StoreError, TransferError, TransportError};
pub use lister::Lister;
pub use progress::{
    ItemProgress, ProgressSnapshot, ProgressTracker, SnapshotCallback, TransferPhase,
};
pub use scheduler::Scheduler;
pub use store::IdempotencyStore;
pub use transport::{ProgressFn, Transport};
pub use types::{
    DEFAULT_CONCURRENCY, DEFAULT_RELAY_DELAY, ItemDescriptor, ItemOutcome, ItemStatus, RunConfig,
    RunReport, RunSummary, TransferStatus,
};
pub use validation::validate_item_key;
