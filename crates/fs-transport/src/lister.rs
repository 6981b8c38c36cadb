use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use ferry_pipeline::{ItemDescriptor, ListError, Lister};
use tracing::warn;

/// Lists every file under a root directory as one item.
///
/// Keys are root-relative paths with `/` separators (even on Windows), so
/// the same tree yields the same keys on every platform. Files whose
/// names are not valid Unicode are skipped with a warning. The listing is
/// sorted by key.
pub struct DirLister {
    root: PathBuf,
}

impl DirLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Lister for DirLister {
    fn list(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ItemDescriptor>, ListError>> + Send + '_>> {
        Box::pin(async move {
            let root = self.root.clone();
            // Directory walks are synchronous; keep them off the runtime.
            tokio::task::spawn_blocking(move || {
                let mut items = Vec::new();
                walk_dir(&root, &root, &mut items)?;
                items.sort_by(|a, b| a.key.cmp(&b.key));
                Ok(items)
            })
            .await
            .map_err(|e| ListError::Other(format!("listing task failed: {e}")))?
        })
    }
}

fn walk_dir(root: &Path, current: &Path, items: &mut Vec<ItemDescriptor>) -> Result<(), ListError> {
    let entries = std::fs::read_dir(current)?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(root, &path, items)?;
        } else if metadata.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;

            // A lossily converted key could collide with a sibling's key.
            let Some(rel) = rel_path.to_str() else {
                warn!(path = %path.display(), "skipping file with non-unicode name");
                continue;
            };

            // Normalize to forward slashes.
            items.push(ItemDescriptor::new(rel.replace('\\', "/"), metadata.len()));
        }
    }

    Ok(())
}
