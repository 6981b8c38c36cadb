fn main() {
    println!("Run `cargo test -p pipeline-e2e` to execute end-to-end pipeline tests.");
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use ferry_fs_transport::{DirLister, DirTransport};
    use ferry_pipeline::{
        ItemStatus, Lister, RunConfig, RunReport, Scheduler, TransferStatus, sha256_bytes,
    };
    use ferry_store::SqliteStore;

    /// One disposable transfer environment: source, destination, staging
    /// and the SQLite database, all under a single tempdir.
    struct Env {
        root: tempfile::TempDir,
    }

    impl Env {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(root.path().join("source")).unwrap();
            std::fs::create_dir_all(root.path().join("dest")).unwrap();
            Self { root }
        }

        fn source(&self) -> PathBuf {
            self.root.path().join("source")
        }

        fn dest(&self) -> PathBuf {
            self.root.path().join("dest")
        }

        fn staging(&self) -> PathBuf {
            self.root.path().join("staging")
        }

        fn db(&self) -> PathBuf {
            self.root.path().join("transfers.db")
        }

        fn write_source(&self, key: &str, content: &[u8]) {
            let path = self.source().join(key);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }

        fn config(&self) -> RunConfig {
            let mut config = RunConfig::new(self.staging());
            config.relay_delay = Duration::ZERO;
            config
        }

        async fn store(&self) -> Arc<SqliteStore> {
            Arc::new(SqliteStore::open(self.db()).await.unwrap())
        }

        /// Lists the source and runs the whole pipeline against a freshly
        /// opened store, the way one CLI invocation would.
        async fn run(&self, config: RunConfig) -> RunReport {
            let store = self.store().await;
            let transport = Arc::new(DirTransport::new(self.source(), self.dest()));
            let items = DirLister::new(self.source()).list().await.unwrap();
            let scheduler = Scheduler::new(config, transport, store);
            scheduler.run(items).await
        }

        /// Every regular file currently under the staging directory.
        fn staged_files(&self) -> Vec<PathBuf> {
            fn walk(dir: &PathBuf, out: &mut Vec<PathBuf>) {
                let Ok(entries) = std::fs::read_dir(dir) else {
                    return;
                };
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        walk(&path, out);
                    } else {
                        out.push(path);
                    }
                }
            }
            let mut out = Vec::new();
            walk(&self.staging(), &mut out);
            out
        }
    }

    // --- Full pipeline over real directories and a real database ---

    #[tokio::test]
    async fn transfers_new_collection_end_to_end() {
        let env = Env::new();
        env.write_source("a.mp4", b"payload of a");
        env.write_source("b.mp4", b"a different payload");
        env.write_source("2024/03/recording.mp4", b"nested payload");

        let report = env.run(env.config()).await;

        assert_eq!(report.summary.files_transferred, 3);
        assert!(report.outcomes.iter().all(|o| o.status == ItemStatus::Uploaded));

        // Destination mirrors the source, nested keys included.
        assert_eq!(
            std::fs::read(env.dest().join("a.mp4")).unwrap(),
            b"payload of a"
        );
        assert_eq!(
            std::fs::read(env.dest().join("2024/03/recording.mp4")).unwrap(),
            b"nested payload"
        );

        // One uploaded record per item, carrying the real content hash.
        let store = env.store().await;
        let record = store.record("a.mp4").await.unwrap().unwrap();
        assert_eq!(record.status, TransferStatus::Uploaded);
        assert_eq!(record.file_size, b"payload of a".len() as i64);
        assert_eq!(record.content_hash, sha256_bytes(b"payload of a"));
        assert_eq!(store.records().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn second_run_skips_everything() {
        let env = Env::new();
        env.write_source("a.mp4", b"first");
        env.write_source("b.mp4", b"second");

        let first = env.run(env.config()).await;
        assert_eq!(first.summary.files_transferred, 2);

        // The store is reopened from disk for the second run.
        let second = env.run(env.config()).await;
        assert_eq!(second.summary.files_transferred, 0);
        assert_eq!(second.summary.bytes_transferred, 0);
        assert!(second.outcomes.iter().all(|o| o.status == ItemStatus::Skipped));
        assert_eq!(env.store().await.records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn identical_content_transfers_once() {
        let env = Env::new();
        let content = vec![0xAB; 1000];
        env.write_source("a.mp4", &content);
        env.write_source("b.mp4", &content);

        // Serial admission: listing is sorted, so a.mp4 finishes first and
        // b.mp4 hits the content match.
        let mut config = env.config();
        config.concurrency = 1;
        let report = env.run(config).await;

        assert_eq!(report.summary.files_transferred, 1);
        assert_eq!(report.summary.bytes_transferred, 1000);

        let a = report.outcomes.iter().find(|o| o.key == "a.mp4").unwrap();
        let b = report.outcomes.iter().find(|o| o.key == "b.mp4").unwrap();
        assert_eq!(a.status, ItemStatus::Uploaded);
        assert_eq!(b.status, ItemStatus::Skipped);
        // Both account their actual size toward overall progress.
        assert_eq!(a.bytes, 1000);
        assert_eq!(b.bytes, 1000);

        // One record, one destination object.
        let store = env.store().await;
        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_key, "a.mp4");
        assert!(env.dest().join("a.mp4").exists());
        assert!(!env.dest().join("b.mp4").exists());
    }

    #[tokio::test]
    async fn renamed_file_is_skipped_across_runs() {
        let env = Env::new();
        let content = b"same bytes under either name";
        env.write_source("old-name.mp4", content);

        let first = env.run(env.config()).await;
        assert_eq!(first.summary.files_transferred, 1);

        // Rename between runs: a new key carrying identical content.
        std::fs::remove_file(env.source().join("old-name.mp4")).unwrap();
        env.write_source("new-name.mp4", content);

        let second = env.run(env.config()).await;
        let renamed = second
            .outcomes
            .iter()
            .find(|o| o.key == "new-name.mp4")
            .unwrap();
        assert_eq!(renamed.status, ItemStatus::Skipped);
        assert_eq!(second.summary.files_transferred, 0);

        // The first record still covers the content; a skip adds nothing.
        let store = env.store().await;
        let records = store.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].file_key, "old-name.mp4");
        assert!(!env.dest().join("new-name.mp4").exists());
    }

    #[tokio::test]
    async fn dry_run_leaves_destination_untouched() {
        let env = Env::new();
        env.write_source("clip.mp4", b"dry run payload");

        let mut config = env.config();
        config.dry_run = true;
        let report = env.run(config).await;

        assert_eq!(report.outcomes[0].status, ItemStatus::DryRun);
        assert_eq!(report.summary.files_transferred, 0);
        assert!(std::fs::read_dir(env.dest()).unwrap().next().is_none());
        assert!(env.staged_files().is_empty());

        // The record still carries the real size and hash.
        let store = env.store().await;
        let record = store.record("clip.mp4").await.unwrap().unwrap();
        assert_eq!(record.status, TransferStatus::DryRun);
        assert_eq!(record.file_size, b"dry run payload".len() as i64);
        assert_eq!(record.content_hash, sha256_bytes(b"dry run payload"));

        // A later real run treats the item as already seen.
        let rerun = env.run(env.config()).await;
        assert_eq!(rerun.summary.files_transferred, 0);
        assert_eq!(rerun.outcomes[0].status, ItemStatus::Skipped);
        assert!(std::fs::read_dir(env.dest()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn vanished_source_records_error_and_stays_eligible() {
        let env = Env::new();
        env.write_source("keep.mp4", b"keep me");
        env.write_source("gone.mp4", b"going away");

        // List first, then remove one file so its fetch fails.
        let items = DirLister::new(env.source()).list().await.unwrap();
        std::fs::remove_file(env.source().join("gone.mp4")).unwrap();

        let store = env.store().await;
        let transport = Arc::new(DirTransport::new(env.source(), env.dest()));
        let scheduler = Scheduler::new(env.config(), transport, store.clone());
        let report = scheduler.run(items).await;

        assert_eq!(report.summary.files_transferred, 1);
        assert_eq!(report.failed(), 1);

        // Error records carry zero size and a placeholder hash.
        let record = store.record("gone.mp4").await.unwrap().unwrap();
        assert_eq!(record.status, TransferStatus::Error);
        assert_eq!(record.file_size, 0);
        assert_eq!(record.content_hash, "?");
        assert!(record.error.is_some());

        // Once the file is back, the error record does not suppress it.
        env.write_source("gone.mp4", b"going away");
        let rerun = env.run(env.config()).await;
        let gone = rerun.outcomes.iter().find(|o| o.key == "gone.mp4").unwrap();
        assert_eq!(gone.status, ItemStatus::Uploaded);
        assert_eq!(rerun.summary.files_transferred, 1);

        let record = store.record("gone.mp4").await.unwrap().unwrap();
        assert_eq!(record.status, TransferStatus::Uploaded);
        assert_eq!(record.content_hash, sha256_bytes(b"going away"));
    }

    // --- Staging lifecycle ---

    #[tokio::test]
    async fn staged_copies_removed_after_recording() {
        let env = Env::new();
        env.write_source("a.mp4", b"staged then cleaned");

        env.run(env.config()).await;

        assert!(env.staged_files().is_empty());
    }

    #[tokio::test]
    async fn staged_copies_kept_when_cleanup_disabled() {
        let env = Env::new();
        env.write_source("a.mp4", b"staged and kept");

        let mut config = env.config();
        config.auto_cleanup = false;
        env.run(config).await;

        let staged = env.staged_files();
        assert_eq!(staged.len(), 1);
        assert_eq!(std::fs::read(&staged[0]).unwrap(), b"staged and kept");
    }
}
