//! Static file store
//!
//! Byte blobs addressed by relative paths, kept either under one base
//! directory or in one S3 bucket (optionally under a key prefix).
//!
//! - `filesystem` - Local directory backend
//! - `s3` - S3 / S3-compatible backend
//! - `error` - Error types for file operations

pub mod error;
pub mod filesystem;
pub mod s3;

use std::path::{Component, Path};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::{FilesConfig, StorageBackend};

pub use error::FileStorageError;
pub use filesystem::FilesystemStore;
pub use s3::S3Store;

/// Trait for static file backends
///
/// Paths are relative, `/`-separated and may not contain `..`.
#[async_trait]
pub trait StaticFileStore: Send + Sync {
    /// Store a new file; fails with `AlreadyExists` if the path is taken
    async fn create(&self, path: &str, data: &[u8]) -> Result<(), FileStorageError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, FileStorageError>;

    /// Replace the file contents, creating the file when absent
    async fn update(&self, path: &str, data: &[u8]) -> Result<(), FileStorageError>;

    /// Remove a file; fails with `NotFound` if absent
    async fn delete(&self, path: &str) -> Result<(), FileStorageError>;

    async fn exists(&self, path: &str) -> Result<bool, FileStorageError>;

    async fn health_check(&self) -> Result<(), FileStorageError>;

    fn backend_name(&self) -> &'static str;
}

/// Reject empty, absolute and parent-escaping paths
pub(crate) fn validate_path(path: &str) -> Result<(), FileStorageError> {
    if path.trim().is_empty() {
        return Err(FileStorageError::invalid_path(path, "path is empty"));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(FileStorageError::invalid_path(path, "path must be relative"));
    }
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Err(FileStorageError::invalid_path(
                    path,
                    "parent components are not allowed",
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(FileStorageError::invalid_path(path, "path must be relative"));
            }
        }
    }
    Ok(())
}

/// Open the configured backend
pub async fn open(config: &FilesConfig) -> Result<Arc<dyn StaticFileStore>, FileStorageError> {
    let store: Arc<dyn StaticFileStore> = match config.storage {
        StorageBackend::S3 => {
            let s3_config = config.s3.as_ref().ok_or_else(|| {
                FileStorageError::Backend(
                    "S3 storage configured but no s3 config provided (missing bucket)".to_string(),
                )
            })?;
            Arc::new(
                S3Store::new(
                    s3_config.bucket.clone(),
                    s3_config.prefix.clone(),
                    s3_config.region.clone(),
                    s3_config.endpoint.clone(),
                )
                .await?,
            )
        }
        StorageBackend::Filesystem => {
            Arc::new(FilesystemStore::new(config.filesystem_path.clone()).await?)
        }
    };

    tracing::debug!(storage = %config.storage, backend = store.backend_name(), "File store opened");
    Ok(store)
}
