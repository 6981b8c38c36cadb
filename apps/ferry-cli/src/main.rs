//! Ferry command-line entry point.
//!
//! Lists the source collection, runs the transfer pipeline against it and
//! prints a summary. Each distinct file is transferred at most once across
//! runs; the SQLite transfer store carries that memory between invocations.

mod config;
mod format;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ferry_fs_transport::{DirLister, DirTransport};
use ferry_pipeline::{Lister, Scheduler};
use ferry_store::SqliteStore;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::FerryConfig;
use crate::format::{format_bytes, format_rate};

/// Moves file objects from a source directory to a destination directory,
/// transferring each distinct file at most once across runs.
#[derive(Debug, Parser)]
#[command(name = "ferry", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "ferry.toml")]
    config: PathBuf,

    /// Fetch and hash items without contacting the destination.
    #[arg(long)]
    dry_run: bool,

    /// Override the configured concurrency limit.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Keep staged copies instead of deleting them after recording.
    #[arg(long)]
    keep_staged: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "starting ferry");

    let mut config = FerryConfig::load_or_init(&cli.config)?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency.max(1);
    }
    if cli.keep_staged {
        config.auto_cleanup = false;
    }

    let store = Arc::new(SqliteStore::open(&config.db_path).await?);
    let transport = Arc::new(DirTransport::new(&config.source_dir, &config.dest_dir));
    let lister = DirLister::new(&config.source_dir);

    let items = lister.list().await?;
    info!(
        items = items.len(),
        source = %config.source_dir.display(),
        dest = %config.dest_dir.display(),
        "listed source collection"
    );

    let scheduler = Scheduler::new(config.run_config(), transport, store);

    // Ctrl-C cancels the run; items already past their admission gate
    // finish or fail on their own.
    let cancel = scheduler.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let progress = scheduler.progress();
    progress.on_snapshot(Box::new(|snapshot| {
        if snapshot.expected == 0 {
            return;
        }
        info!(
            processed = %format_bytes(snapshot.processed),
            expected = %format_bytes(snapshot.expected),
            active = snapshot.items.len(),
            "progress"
        );
        for item in &snapshot.items {
            debug!(
                key = %item.key,
                phase = ?item.phase,
                transferred = item.transferred,
                total = item.total,
                "active item"
            );
        }
    }));
    progress.start();

    let report = scheduler.run(items).await;
    progress.stop();

    let summary = &report.summary;
    info!(
        files = summary.files_transferred,
        bytes = %format_bytes(summary.bytes_transferred),
        elapsed_secs = summary.elapsed_seconds(),
        rate = %format_rate(summary.average_throughput()),
        "transfer run finished"
    );

    let failed = report.failed();
    if failed > 0 {
        anyhow::bail!("{failed} item(s) failed; they will be retried on the next run");
    }
    Ok(())
}
