use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use ferry_pipeline::{
    ItemDescriptor, ProgressFn, Transport, TransportError, validate_item_key,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Copy buffer for streaming between files.
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Transport over two plain directories.
///
/// `fetch` reads `source_root/<key>` into the staging path; `relay`
/// writes the staged copy to `dest_root/<key>`, creating parent
/// directories on the way. Progress callbacks fire once per buffer with
/// the cumulative byte count.
pub struct DirTransport {
    source_root: PathBuf,
    dest_root: PathBuf,
}

impl DirTransport {
    pub fn new(source_root: impl Into<PathBuf>, dest_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
        }
    }

    async fn copy_with_progress(
        src: &Path,
        dest: &Path,
        progress: &ProgressFn,
    ) -> Result<u64, TransportError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = tokio::fs::File::open(src).await?;
        let mut writer = tokio::fs::File::create(dest).await?;
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut total: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            total += n as u64;
            progress(total);
        }

        writer.flush().await?;
        Ok(total)
    }
}

impl Transport for DirTransport {
    fn fetch<'a>(
        &'a self,
        item: &'a ItemDescriptor,
        dest: &'a Path,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<u64, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            validate_item_key(&item.key).map_err(|e| TransportError::Other(e.to_string()))?;
            let src = self.source_root.join(&item.key);
            let bytes = Self::copy_with_progress(&src, dest, &progress).await?;
            debug!(key = %item.key, bytes, "fetched from source directory");
            Ok(bytes)
        })
    }

    fn relay<'a>(
        &'a self,
        src: &'a Path,
        item: &'a ItemDescriptor,
        progress: ProgressFn,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            validate_item_key(&item.key).map_err(|e| TransportError::Other(e.to_string()))?;
            let dest = self.dest_root.join(&item.key);
            let bytes = Self::copy_with_progress(src, &dest, &progress).await?;
            debug!(key = %item.key, bytes, "relayed to destination directory");
            Ok(())
        })
    }
}
