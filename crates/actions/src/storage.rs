//! Storage boundary used by actions that produce artifacts (screenshots, exports).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("upload failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Upload capability carried on the run context.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Store `data` under `key` and return a URL readers can fetch it from.
    async fn upload_file(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// Writes artifacts below a local directory and returns `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn target_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative.components().any(|c| {
            !matches!(c, std::path::Component::Normal(_) | std::path::Component::CurDir)
        });
        if key.is_empty() || escapes {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn upload_file(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let path = self.target_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        debug!(key, content_type, bytes = data.len(), "artifact stored");

        let absolute = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("actions-storage-{name}-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn upload_writes_file_and_returns_file_url() {
        let root = scratch_dir("upload");
        let storage = LocalStorage::new(&root);

        let url = storage
            .upload_file("runs/r1/shot.png", vec![1, 2, 3], "image/png")
            .await
            .expect("upload should succeed");

        assert!(url.starts_with("file://"));
        assert!(url.ends_with("shot.png"));
        let written = std::fs::read(root.join("runs/r1/shot.png")).unwrap();
        assert_eq!(written, vec![1, 2, 3]);
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn keys_escaping_the_root_are_rejected() {
        let storage = LocalStorage::new(scratch_dir("escape"));
        let err = storage
            .upload_file("../outside.png", vec![], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
