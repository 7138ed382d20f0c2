//! S3-backed static file store
//!
//! Objects are stored at `{prefix}/{path}` in one bucket (AWS S3 or an
//! S3-compatible service like MinIO).

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;

use super::error::FileStorageError;
use super::{StaticFileStore, validate_path};

#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    pub async fn new(
        bucket: String,
        prefix: String,
        region: Option<String>,
        endpoint: Option<String>,
    ) -> Result<Self, FileStorageError> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = region {
            config_loader = config_loader.region(aws_sdk_s3::config::Region::new(region));
        }

        let config = config_loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&config);
        if let Some(endpoint_url) = endpoint {
            // S3-compatible services mostly require path-style addressing
            s3_config = s3_config.endpoint_url(endpoint_url).force_path_style(true);
        }

        let client = Client::from_conf(s3_config.build());

        tracing::debug!(bucket = %bucket, prefix = %prefix, "S3 file store initialized");

        Ok(Self {
            client,
            bucket,
            prefix,
        })
    }

    fn object_key(&self, path: &str) -> Result<String, FileStorageError> {
        validate_path(path)?;
        Ok(compute_object_key(&self.prefix, path))
    }

    async fn head(&self, key: &str) -> Result<bool, FileStorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(FileStorageError::Backend(format!(
                        "S3 head_object error: {}",
                        service_err
                    )))
                }
            }
        }
    }
}

/// `{prefix}/{path}` with `./` segments and duplicate slashes dropped
fn compute_object_key(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/");
    if prefix.is_empty() {
        path
    } else {
        format!("{}/{}", prefix, path)
    }
}

#[async_trait]
impl StaticFileStore for S3Store {
    async fn create(&self, path: &str, data: &[u8]) -> Result<(), FileStorageError> {
        let key = self.object_key(path)?;

        // If-None-Match makes the create conditional on the key being free
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .if_none_match("*")
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.code() == Some("PreconditionFailed") {
                    FileStorageError::AlreadyExists(path.to_string())
                } else {
                    FileStorageError::Backend(format!("S3 put_object error: {}", service_err))
                }
            })?;

        tracing::debug!(path, size = data.len(), key = %key, "File created in S3");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, FileStorageError> {
        let key = self.object_key(path)?;

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    FileStorageError::NotFound(path.to_string())
                } else {
                    FileStorageError::Backend(format!("S3 get_object error: {}", service_err))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| FileStorageError::Backend(format!("S3 body read error: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(data)
    }

    async fn update(&self, path: &str, data: &[u8]) -> Result<(), FileStorageError> {
        let key = self.object_key(path)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| FileStorageError::Backend(format!("S3 put_object error: {}", e)))?;

        tracing::debug!(path, size = data.len(), key = %key, "File written to S3");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), FileStorageError> {
        let key = self.object_key(path)?;

        // delete_object succeeds for absent keys, so check first
        if !self.head(&key).await? {
            return Err(FileStorageError::NotFound(path.to_string()));
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| FileStorageError::Backend(format!("S3 delete_object error: {}", e)))?;

        tracing::debug!(path, key = %key, "File deleted from S3");
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, FileStorageError> {
        let key = self.object_key(path)?;
        self.head(&key).await
    }

    async fn health_check(&self) -> Result<(), FileStorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                FileStorageError::Backend(format!(
                    "S3 head_bucket error: {}",
                    e.into_service_error()
                ))
            })?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_with_prefix() {
        assert_eq!(
            compute_object_key("trellis/files", "docs/readme.md"),
            "trellis/files/docs/readme.md"
        );
        assert_eq!(compute_object_key("/trellis/", "a.txt"), "trellis/a.txt");
    }

    #[test]
    fn test_object_key_normalizes_path() {
        assert_eq!(compute_object_key("", "./a//b.txt"), "a/b.txt");
    }
}
