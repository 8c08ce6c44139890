//! Filesystem-backed [`BlobStore`].

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{PipelineError, Result};

use super::BlobStore;

/// Serves blobs from a local directory tree. Paths are relative to the
/// configured root and must not escape it.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBlobStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        let escapes = rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(PipelineError::Download(format!(
                "path escapes blob root: {path}"
            )));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| PipelineError::Download(format!("{}: {e}", full.display())))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| PipelineError::Store(format!("delete {}: {e}", full.display())))
    }
}
