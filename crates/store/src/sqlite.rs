use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use ferry_pipeline::{IdempotencyStore, StoreError, TransferStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::debug;

use crate::TransferRecord;

/// How long a writer waits on a locked database before erroring.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Row = (String, i64, String, String, Option<String>);

/// SQLite implementation of the pipeline's idempotency store.
///
/// The pool holds a single connection, so all writes are totally ordered
/// and conflicting upserts to the same key serialize. WAL journaling with
/// NORMAL synchronous makes an upsert durable before the call returns.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Opens the database at `path`, creating file, parent directories and
    /// schema as needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::new(e.to_string()))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
            .map_err(db_error)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(db_error)?;

        let store = Self { pool };
        store.migrate().await?;
        debug!(path = %path.display(), "transfer store ready");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transfers (
                file_key     TEXT PRIMARY KEY,
                file_size    INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                status       TEXT NOT NULL,
                error        TEXT
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    /// Returns the record for `key`, if any.
    pub async fn record(&self, key: &str) -> Result<Option<TransferRecord>, StoreError> {
        let row: Option<Row> = sqlx::query_as(
            "SELECT file_key, file_size, content_hash, status, error
             FROM transfers WHERE file_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(decode_row).transpose()
    }

    /// Returns every record, ordered by key.
    pub async fn records(&self) -> Result<Vec<TransferRecord>, StoreError> {
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT file_key, file_size, content_hash, status, error
             FROM transfers ORDER BY file_key",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(decode_row).collect()
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    StoreError::new(e.to_string())
}

fn decode_row(row: Row) -> Result<TransferRecord, StoreError> {
    let (file_key, file_size, content_hash, status, error) = row;
    let status = TransferStatus::parse(&status)
        .ok_or_else(|| StoreError::new(format!("unknown status {status:?} for {file_key}")))?;
    Ok(TransferRecord {
        file_key,
        file_size,
        content_hash,
        status,
        error,
    })
}

impl IdempotencyStore for SqliteStore {
    fn lookup<'a>(
        &'a self,
        key: &'a str,
        size: u64,
        hash: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            // Error records are excluded so a failed item stays eligible
            // for a later attempt.
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(
                     SELECT 1 FROM transfers
                     WHERE status != 'error'
                       AND (file_key = ? OR (file_size = ? AND content_hash = ?))
                 )",
            )
            .bind(key)
            .bind(size as i64)
            .bind(hash)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(exists)
        })
    }

    fn upsert<'a>(
        &'a self,
        key: &'a str,
        size: u64,
        hash: &'a str,
        status: TransferStatus,
        error: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            sqlx::query(
                "INSERT OR REPLACE INTO transfers
                     (file_key, file_size, content_hash, status, error)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(key)
            .bind(size as i64)
            .bind(hash)
            .bind(status.as_str())
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
            Ok(())
        })
    }
}
