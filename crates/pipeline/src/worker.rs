//! Per-item transfer lifecycle.
//!
//! Each item moves through a linear set of steps with no retries:
//! fetch, hash, dedupe check, then skip, dry-run or relay, then record
//! and cleanup. Failures at any step end with an `error` record whose
//! size and hash can never match a future lookup, so the item stays
//! eligible for the next run.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::digest::sha256_file;
use crate::error::{TransferError, TransportError};
use crate::progress::{ProgressTracker, TransferPhase};
use crate::store::IdempotencyStore;
use crate::transport::Transport;
use crate::types::{ItemDescriptor, ItemOutcome, ItemStatus, RunConfig, TransferStatus};
use crate::validation::validate_item_key;

/// Placeholder digest stored with error records. No hex digest is ever a
/// single `?`, so these records cannot collide with real content.
const UNVERIFIED_HASH: &str = "?";

/// Shared collaborators handed to every worker of a run.
#[derive(Clone)]
pub(crate) struct RunContext {
    pub config: Arc<RunConfig>,
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn IdempotencyStore>,
    pub progress: Arc<ProgressTracker>,
    pub cancel: CancellationToken,
}

/// Runs one item to a terminal state. Item failures never propagate;
/// they become a `Failed` outcome and an `error` record.
pub(crate) async fn transfer_item(item: ItemDescriptor, ctx: RunContext) -> ItemOutcome {
    // The overall denominator grows the moment this item is admitted.
    ctx.progress.add_expected(item.declared_size);

    let transfer = ItemTransfer {
        item: &item,
        ctx: &ctx,
    };
    let result = transfer.run().await;
    // Per-item progress entries must not outlive the item, whichever way
    // it exited.
    ctx.progress.untrack(&item.key);

    match result {
        Ok(outcome) => outcome,
        Err(TransferError::Cancelled) => {
            debug!(key = %item.key, "transfer cancelled");
            ItemOutcome::cancelled(&item.key)
        }
        Err(err) => {
            warn!(key = %item.key, error = %err, "transfer failed");
            let message = err.to_string();
            if let Err(store_err) = ctx
                .store
                .upsert(
                    &item.key,
                    0,
                    UNVERIFIED_HASH,
                    TransferStatus::Error,
                    Some(&message),
                )
                .await
            {
                // The one unrecoverable case: the failure itself could not
                // be recorded. The item's state is unknown until next run.
                warn!(
                    key = %item.key,
                    error = %store_err,
                    "failed to record transfer error"
                );
            }
            ctx.progress.advance(item.declared_size);
            ItemOutcome {
                key: item.key,
                status: ItemStatus::Failed,
                bytes: 0,
                error: Some(message),
            }
        }
    }
}

/// One item moving through the lifecycle.
struct ItemTransfer<'a> {
    item: &'a ItemDescriptor,
    ctx: &'a RunContext,
}

impl ItemTransfer<'_> {
    async fn run(&self) -> Result<ItemOutcome, TransferError> {
        validate_item_key(&self.item.key)?;
        self.check_cancelled()?;

        let staging_path = self.staging_path();
        if let Some(parent) = staging_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TransferError::Fetch(TransportError::Io(e)))?;
        }

        // Fetch.
        let progress = &self.ctx.progress;
        progress.track(
            &self.item.key,
            self.item.declared_size,
            TransferPhase::Fetching,
        );
        let on_fetch = progress.progress_fn(&self.item.key);
        let actual_size = self
            .with_deadline(self.ctx.transport.fetch(self.item, &staging_path, on_fetch))
            .await
            .map_err(TransferError::Fetch)?;
        progress.untrack(&self.item.key);

        // Hash the complete staged copy before any dedupe decision.
        let hash = sha256_file(&staging_path)
            .await
            .map_err(TransferError::Hash)?;
        debug!(key = %self.item.key, bytes = actual_size, hash = %hash, "fetched and hashed");

        if self
            .ctx
            .store
            .lookup(&self.item.key, actual_size, &hash)
            .await?
        {
            info!(key = %self.item.key, "already transferred, skipping");
            self.cleanup(&staging_path).await;
            progress.advance(actual_size);
            return Ok(self.outcome(ItemStatus::Skipped, actual_size));
        }

        if self.ctx.config.dry_run {
            self.ctx
                .store
                .upsert(
                    &self.item.key,
                    actual_size,
                    &hash,
                    TransferStatus::DryRun,
                    None,
                )
                .await?;
            info!(key = %self.item.key, bytes = actual_size, "dry run, would relay");
            self.cleanup(&staging_path).await;
            progress.advance(actual_size);
            return Ok(self.outcome(ItemStatus::DryRun, actual_size));
        }

        // Pause before relaying. Cancellation wins over the timer.
        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => return Err(TransferError::Cancelled),
            _ = tokio::time::sleep(self.ctx.config.relay_delay) => {}
        }

        // Relay.
        progress.track(&self.item.key, actual_size, TransferPhase::Relaying);
        let on_relay = progress.progress_fn(&self.item.key);
        self.with_deadline(self.ctx.transport.relay(&staging_path, self.item, on_relay))
            .await
            .map_err(TransferError::Relay)?;
        progress.untrack(&self.item.key);

        // The record must be durable before the staged copy goes away.
        self.ctx
            .store
            .upsert(
                &self.item.key,
                actual_size,
                &hash,
                TransferStatus::Uploaded,
                None,
            )
            .await?;
        info!(key = %self.item.key, bytes = actual_size, "relayed");
        self.cleanup(&staging_path).await;
        progress.advance(actual_size);
        Ok(self.outcome(ItemStatus::Uploaded, actual_size))
    }

    fn staging_path(&self) -> PathBuf {
        self.ctx.config.staging_dir.join(&self.item.key)
    }

    fn check_cancelled(&self) -> Result<(), TransferError> {
        if self.ctx.cancel.is_cancelled() {
            Err(TransferError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Applies the optional transfer timeout to a transport operation.
    async fn with_deadline<T>(
        &self,
        op: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        match self.ctx.config.transfer_timeout {
            Some(limit) => match tokio::time::timeout(limit, op).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            },
            None => op.await,
        }
    }

    /// Deletes the staged copy. Only called once the branch's store state
    /// is final, so failure here is logged instead of failing the item.
    async fn cleanup(&self, staging_path: &Path) {
        if !self.ctx.config.auto_cleanup {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(staging_path).await {
            warn!(key = %self.item.key, error = %e, "failed to remove staged copy");
        }
    }

    fn outcome(&self, status: ItemStatus, bytes: u64) -> ItemOutcome {
        ItemOutcome {
            key: self.item.key.clone(),
            status,
            bytes,
            error: None,
        }
    }
}
