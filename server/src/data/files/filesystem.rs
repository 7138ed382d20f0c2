//! Filesystem-backed static file store
//!
//! Files live at `{base_path}/{path}`; intermediate directories are created
//! on write and pruned after delete when they become empty.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::FileStorageError;
use super::{StaticFileStore, validate_path};

#[derive(Debug, Clone)]
pub struct FilesystemStore {
    base_path: PathBuf,
}

impl FilesystemStore {
    /// Open a store rooted at `base_path`, creating the directory if needed
    pub async fn new(base_path: PathBuf) -> Result<Self, FileStorageError> {
        fs::create_dir_all(&base_path).await?;
        tracing::debug!(path = %base_path.display(), "Filesystem file store initialized");
        Ok(Self { base_path })
    }

    fn file_path(&self, path: &str) -> Result<PathBuf, FileStorageError> {
        validate_path(path)?;
        Ok(self.base_path.join(path))
    }

    async fn ensure_parent_dirs(&self, path: &Path) -> Result<(), FileStorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Remove empty directories between the file and the base (best effort)
    async fn cleanup_empty_parents(&self, file_path: &Path) {
        let mut current = file_path.parent();
        while let Some(dir) = current {
            if dir == self.base_path || !dir.starts_with(&self.base_path) {
                break;
            }
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    /// A create that fails mid-write leaves no file behind
    async fn discard_partial(
        full: &Path,
        written: std::io::Result<()>,
    ) -> Result<(), FileStorageError> {
        let Err(e) = written else {
            return Ok(());
        };
        if let Err(remove_err) = fs::remove_file(full).await {
            tracing::warn!(
                path = %full.display(),
                error = %remove_err,
                "Failed to remove partially written file"
            );
        }
        Err(FileStorageError::Io(e))
    }

    fn not_found(path: &str) -> impl FnOnce(std::io::Error) -> FileStorageError + '_ {
        move |e| {
            if e.kind() == ErrorKind::NotFound {
                FileStorageError::NotFound(path.to_string())
            } else {
                FileStorageError::Io(e)
            }
        }
    }
}

#[async_trait]
impl StaticFileStore for FilesystemStore {
    async fn create(&self, path: &str, data: &[u8]) -> Result<(), FileStorageError> {
        let full = self.file_path(path)?;
        self.ensure_parent_dirs(&full).await?;

        // create_new makes the existence check and the create one step
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    FileStorageError::AlreadyExists(path.to_string())
                } else {
                    FileStorageError::Io(e)
                }
            })?;
        let written = match file.write_all(data).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        drop(file);
        Self::discard_partial(&full, written).await?;

        tracing::debug!(path, size = data.len(), "File created");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, FileStorageError> {
        let full = self.file_path(path)?;
        fs::read(&full).await.map_err(Self::not_found(path))
    }

    async fn update(&self, path: &str, data: &[u8]) -> Result<(), FileStorageError> {
        let full = self.file_path(path)?;
        self.ensure_parent_dirs(&full).await?;
        fs::write(&full, data).await?;

        tracing::debug!(path, size = data.len(), "File written");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), FileStorageError> {
        let full = self.file_path(path)?;
        fs::remove_file(&full).await.map_err(Self::not_found(path))?;
        tracing::debug!(path, "File deleted");

        self.cleanup_empty_parents(&full).await;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, FileStorageError> {
        let full = self.file_path(path)?;
        Ok(fs::try_exists(&full).await?)
    }

    async fn health_check(&self) -> Result<(), FileStorageError> {
        let meta = fs::metadata(&self.base_path).await?;
        if !meta.is_dir() {
            return Err(FileStorageError::Backend(format!(
                "{} is not a directory",
                self.base_path.display()
            )));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> FilesystemStore {
        FilesystemStore::new(dir.path().to_path_buf()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        store.create("docs/guide/readme.md", b"# Trellis").await.unwrap();
        assert_eq!(store.get("docs/guide/readme.md").await.unwrap(), b"# Trellis");
        assert!(store.exists("docs/guide/readme.md").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_existing_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        store.create("a.bin", b"one").await.unwrap();
        let err = store.create("a.bin", b"two").await.unwrap_err();
        assert!(matches!(err, FileStorageError::AlreadyExists(_)));
        assert_eq!(store.get("a.bin").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_failed_write_leaves_path_free() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;
        let full = temp_dir.path().join("half.bin");
        fs::write(&full, b"partial").await.unwrap();

        let err = FilesystemStore::discard_partial(
            &full,
            Err(std::io::Error::other("disk full")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FileStorageError::Io(_)));
        assert!(!full.exists());

        store.create("half.bin", b"whole").await.unwrap();
        assert_eq!(store.get("half.bin").await.unwrap(), b"whole");
    }

    #[tokio::test]
    async fn test_successful_write_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let full = temp_dir.path().join("kept.bin");
        fs::write(&full, b"data").await.unwrap();

        FilesystemStore::discard_partial(&full, Ok(())).await.unwrap();
        assert!(full.exists());
    }

    #[tokio::test]
    async fn test_update_creates_when_absent() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        store.update("new/file.txt", b"v1").await.unwrap();
        assert_eq!(store.get("new/file.txt").await.unwrap(), b"v1");

        store.update("new/file.txt", b"v2").await.unwrap();
        store.update("new/file.txt", b"v2").await.unwrap();
        assert_eq!(store.get("new/file.txt").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_empty_payload() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        store.create("empty", b"").await.unwrap();
        assert!(store.get("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        assert!(store.get("nope.txt").await.unwrap_err().is_not_found());
        assert!(store.delete("nope.txt").await.unwrap_err().is_not_found());
        assert!(!store.exists("nope.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_prunes_empty_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        store.create("x/y/z.txt", b"z").await.unwrap();
        store.delete("x/y/z.txt").await.unwrap();

        assert!(!temp_dir.path().join("x").exists());
        assert!(temp_dir.path().exists());
        assert!(store.get("x/y/z.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_escaping_path() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        let err = store.update("../outside.txt", b"x").await.unwrap_err();
        assert!(matches!(err, FileStorageError::InvalidPath { .. }));
    }

    #[tokio::test]
    async fn test_health_check() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;
        store.health_check().await.unwrap();
        assert_eq!(store.backend_name(), "filesystem");
    }
}
