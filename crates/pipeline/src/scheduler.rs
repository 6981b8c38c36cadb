//! Run scheduler: bounded-concurrency dispatch over all items.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::progress::ProgressTracker;
use crate::store::IdempotencyStore;
use crate::transport::Transport;
use crate::types::{ItemDescriptor, ItemOutcome, ItemStatus, RunConfig, RunReport, RunSummary};
use crate::worker::{RunContext, transfer_item};

/// Drives one run: admits at most `concurrency` workers at a time and
/// returns only after every item reached a terminal state.
pub struct Scheduler {
    config: Arc<RunConfig>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn IdempotencyStore>,
    progress: Arc<ProgressTracker>,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Creates a scheduler over the given collaborators.
    pub fn new(
        config: RunConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn IdempotencyStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            store,
            progress: Arc::new(ProgressTracker::new(None)),
            cancel: CancellationToken::new(),
        }
    }

    /// The run's progress aggregator, for snapshot callbacks.
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    /// Returns a cancellation token for this run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Transfers every item to a terminal state.
    ///
    /// Individual failures never abort the batch. The report carries one
    /// outcome per item, in input order.
    pub async fn run(&self, items: Vec<ItemDescriptor>) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        // Totals always describe this run, even on a reused scheduler.
        self.progress.reset();
        info!(
            run = %run_id,
            items = items.len(),
            concurrency = self.config.concurrency,
            dry_run = self.config.dry_run,
            "starting transfer run"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let key = item.key.clone();
            let ctx = RunContext {
                config: Arc::clone(&self.config),
                transport: Arc::clone(&self.transport),
                store: Arc::clone(&self.store),
                progress: Arc::clone(&self.progress),
                cancel: self.cancel.clone(),
            };
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                // Admission gate: tasks queue here until a slot frees.
                let _permit = tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        return ItemOutcome::cancelled(&item.key);
                    }
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return ItemOutcome::cancelled(&item.key),
                    },
                };
                transfer_item(item, ctx).await
            });
            handles.push((key, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (key, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(key = %key, error = %e, "transfer task panicked");
                    outcomes.push(ItemOutcome {
                        key,
                        status: ItemStatus::Failed,
                        bytes: 0,
                        error: Some(format!("transfer task panicked: {e}")),
                    });
                }
            }
        }

        let uploaded = || {
            outcomes
                .iter()
                .filter(|o| o.status == ItemStatus::Uploaded)
        };
        let summary = RunSummary {
            files_transferred: uploaded().count() as u64,
            bytes_transferred: uploaded().map(|o| o.bytes).sum(),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            run = %run_id,
            files = summary.files_transferred,
            bytes = summary.bytes_transferred,
            elapsed_secs = summary.elapsed_seconds(),
            "run complete"
        );

        RunReport { summary, outcomes }
    }
}
