//! Local filesystem disk.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::fs;
use uuid::Uuid;

use super::{FileStore, UploadedFile};
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub async fn new(root: impl AsRef<Path>) -> AppResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| AppError::storage(format!("failed to create storage root {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    /// Resolves a relative path inside the root, refusing anything that could escape it.
    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let clean = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if path.is_empty() || !clean {
            return Err(AppError::bad_request(format!("invalid file path: {path}")));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStore for LocalDisk {
    async fn store(&self, directory: &str, file: &UploadedFile) -> AppResult<String> {
        let name = match file.extension() {
            Some(ext) => format!("{}.{}", Uuid::new_v4().simple(), ext),
            None => Uuid::new_v4().simple().to_string(),
        };
        let relative = format!("{}/{}", directory.trim_matches('/'), name);
        let full_path = self.resolve(&relative)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::storage(format!("failed to create {}: {e}", parent.display())))?;
        }

        fs::write(&full_path, &file.data)
            .await
            .map_err(|e| AppError::storage(format!("failed to write {relative}: {e}")))?;

        tracing::debug!(path = %relative, bytes = file.data.len(), "stored file");
        Ok(relative)
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!(path = %path, "deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::storage(format!("failed to delete {path}: {e}"))),
        }
    }

    async fn exists(&self, path: &str) -> AppResult<bool> {
        let full_path = self.resolve(path)?;
        Ok(fs::try_exists(&full_path).await.unwrap_or(false))
    }

    async fn read(&self, path: &str) -> AppResult<Bytes> {
        let full_path = self.resolve(path)?;
        fs::read(&full_path).await.map(Bytes::from).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("file not found: {path}"))
            } else {
                AppError::storage(format!("failed to read {path}: {e}"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        let file = UploadedFile {
            file_name: "budget.PDF".into(),
            content_type: Some("application/pdf".into()),
            data: Bytes::from_static(b"%PDF-1.4"),
        };

        let path = disk.store("disclosures", &file).await.unwrap();
        assert!(path.starts_with("disclosures/"));
        assert!(path.ends_with(".pdf"));
        assert_eq!(disk.read(&path).await.unwrap(), Bytes::from_static(b"%PDF-1.4"));

        disk.delete(&path).await.unwrap();
        assert!(!disk.exists(&path).await.unwrap());
        // deleting twice is fine
        disk.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();

        assert!(matches!(disk.read("../etc/passwd").await, Err(AppError::BadRequest(_))));
        assert!(matches!(disk.read("news/../../x").await, Err(AppError::BadRequest(_))));
        assert!(matches!(disk.read("").await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path()).await.unwrap();
        assert!(matches!(disk.read("news/none.jpg").await, Err(AppError::NotFound(_))));
    }
}
