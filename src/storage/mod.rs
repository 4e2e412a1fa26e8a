//! File storage: a disk addressed by relative paths, plus the bookkeeping
//! that ties stored files to a record mutation.

mod local;

pub use local::LocalDisk;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::errors::{AppError, AppResult};

const DEFAULT_UPLOAD_ROOT: &str = "storage/public";
const DEFAULT_UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: String,
    pub max_upload_bytes: usize,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let root = std::env::var("UPLOAD_ROOT").unwrap_or_else(|_| DEFAULT_UPLOAD_ROOT.to_string());
        let max_upload_bytes = std::env::var("UPLOAD_MAX_BYTES")
            .map(|val| val.parse::<usize>())
            .unwrap_or(Ok(DEFAULT_UPLOAD_MAX_BYTES))
            .map_err(|_| AppError::configuration("UPLOAD_MAX_BYTES must be a valid integer"))?;

        Ok(Self { root, max_upload_bytes })
    }
}

/// A file received in a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes `file` under `directory` with a generated name; returns the relative path.
    async fn store(&self, directory: &str, file: &UploadedFile) -> AppResult<String>;

    async fn delete(&self, path: &str) -> AppResult<()>;

    async fn exists(&self, path: &str) -> AppResult<bool>;

    async fn read(&self, path: &str) -> AppResult<Bytes>;
}

/// Files written and files superseded during one record mutation.
///
/// New files are written before the record; superseded files are removed only
/// once the record change is committed. If the record change fails, the new
/// files are removed instead.
#[derive(Debug, Default)]
pub struct FileChanges {
    stored: Vec<String>,
    retired: Vec<String>,
}

impl FileChanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `file`. On failure everything stored so far is removed.
    pub async fn store(&mut self, store: &dyn FileStore, directory: &str, file: &UploadedFile) -> AppResult<String> {
        match store.store(directory, file).await {
            Ok(path) => {
                self.stored.push(path.clone());
                Ok(path)
            }
            Err(err) => {
                self.discard_stored(store).await;
                Err(err)
            }
        }
    }

    pub async fn store_all(
        &mut self,
        store: &dyn FileStore,
        directory: &str,
        files: &[UploadedFile],
    ) -> AppResult<Vec<String>> {
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            paths.push(self.store(store, directory, file).await?);
        }
        Ok(paths)
    }

    /// Marks an existing path for removal after commit.
    pub fn retire(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !path.is_empty() {
            self.retired.push(path);
        }
    }

    pub fn retire_all<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for path in paths {
            self.retire(path);
        }
    }

    /// Settles the file side of a mutation according to its outcome.
    pub async fn settle<T>(mut self, store: &dyn FileStore, outcome: AppResult<T>) -> AppResult<T> {
        match outcome {
            Ok(value) => {
                release(store, std::mem::take(&mut self.retired)).await;
                Ok(value)
            }
            Err(err) => {
                self.discard_stored(store).await;
                Err(err)
            }
        }
    }

    async fn discard_stored(&mut self, store: &dyn FileStore) {
        let stored = std::mem::take(&mut self.stored);
        if !stored.is_empty() {
            tracing::info!(count = stored.len(), "removing files stored for a failed change");
        }
        release(store, stored).await;
    }
}

/// Best-effort removal. Failures are logged and never surface to the caller.
pub async fn release(store: &dyn FileStore, paths: Vec<String>) {
    for path in paths {
        if let Err(err) = store.delete(&path).await {
            tracing::warn!(path = %path, error = %err, "failed to delete stored file, leaving it orphaned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, body: &'static [u8]) -> UploadedFile {
        UploadedFile {
            file_name: name.to_string(),
            content_type: None,
            data: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn failed_outcome_removes_new_files_and_keeps_retired() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        let old = disk.store("news", &upload("old.jpg", b"old")).await.unwrap();

        let mut changes = FileChanges::new();
        let new = changes.store(&disk, "news", &upload("new.jpg", b"new")).await.unwrap();
        changes.retire(old.clone());

        let outcome: AppResult<()> = Err(AppError::internal("row write failed"));
        assert!(changes.settle(&disk, outcome).await.is_err());

        assert!(!disk.exists(&new).await.unwrap());
        assert!(disk.exists(&old).await.unwrap());
    }

    #[tokio::test]
    async fn successful_outcome_removes_retired_only() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        let old = disk.store("news", &upload("old.jpg", b"old")).await.unwrap();

        let mut changes = FileChanges::new();
        let new = changes.store(&disk, "news", &upload("new.jpg", b"new")).await.unwrap();
        changes.retire(old.clone());

        let value = changes.settle(&disk, Ok(5)).await.unwrap();
        assert_eq!(value, 5);
        assert!(disk.exists(&new).await.unwrap());
        assert!(!disk.exists(&old).await.unwrap());
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(upload("Photo.JPG", b"").extension().as_deref(), Some("jpg"));
        assert_eq!(upload("README", b"").extension(), None);
    }
}
