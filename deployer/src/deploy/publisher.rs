//! Artifact publisher

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{stream, StreamExt, TryStreamExt};
use tokio::task::spawn_blocking;
use tracing::debug;

use crate::blob::mime::content_type_for;
use crate::blob::{join_key, BlobStore};
use crate::errors::DeployError;

/// Uploads a directory tree to the blob store
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn BlobStore>,
    concurrency: usize,
}

impl Publisher {
    pub fn new(store: Arc<dyn BlobStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Upload every regular file under `source` to `<prefix>/<relative path>`.
    ///
    /// Returns the written keys, sorted. The first failed upload cancels the rest.
    pub async fn publish(&self, source: &Path, prefix: &str) -> Result<Vec<String>, DeployError> {
        let root = source.to_owned();
        let files = spawn_blocking(move || list_files(&root))
            .await
            .map_err(|e| DeployError::Internal(format!("File listing failed: {}", e)))??;

        if files.is_empty() {
            return Err(DeployError::Publish(format!(
                "No files to publish in {}",
                source.display()
            )));
        }

        let uploads = files.into_iter().map(|relative| {
            let store = self.store.clone();
            let path = source.join(&relative);
            async move {
                let relative = relative.to_string_lossy().replace('\\', "/");
                let key = join_key(prefix, &relative)?;
                let bytes = tokio::fs::read(&path).await?;
                store
                    .put(&key, Bytes::from(bytes), content_type_for(&relative))
                    .await?;
                debug!("Uploaded {}", key);
                Ok::<_, DeployError>(key)
            }
        });

        let mut keys: Vec<String> = stream::iter(uploads)
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        keys.sort();
        Ok(keys)
    }
}

/// Relative paths of every regular file below `root`; symlinks are not followed
fn list_files(root: &Path) -> Result<Vec<PathBuf>, DeployError> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(relative) = pending.pop() {
        for entry in std::fs::read_dir(root.join(&relative))? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = relative.join(entry.file_name());

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
