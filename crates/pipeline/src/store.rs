//! Idempotency store trait.
//!
//! The persistent set of transfer records that makes repeated runs cheap:
//! a worker consults it after hashing and records into it before cleanup.
//! `ferry-store` ships the SQLite implementation.

use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;
use crate::types::TransferStatus;

/// Persistent transfer records, shared by all workers of a run and by
/// every run against the same destination.
///
/// Implementations must make `upsert` durable before returning and must
/// serialize concurrent writes to the same key. Both methods are safe to
/// call from any number of workers at once.
pub trait IdempotencyStore: Send + Sync {
    /// True if `key` already has a non-error record, or any non-error
    /// record carries the same `(size, hash)` pair. Never mutates.
    ///
    /// Error records are deliberately invisible here: a previously failed
    /// item must stay eligible for a later successful attempt.
    fn lookup<'a>(
        &'a self,
        key: &'a str,
        size: u64,
        hash: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>>;

    /// Inserts or replaces the record for `key`. Last write wins.
    fn upsert<'a>(
        &'a self,
        key: &'a str,
        size: u64,
        hash: &'a str,
        status: TransferStatus,
        error: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;
}
