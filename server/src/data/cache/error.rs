//! Cache error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache configuration error: {0}")]
    Config(String),

    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Failed to encode cached value: {0}")]
    Encode(String),

    #[error("Failed to decode cached value for '{key}': {message}")]
    Decode { key: String, message: String },

    #[error("Cache operation failed: {0}")]
    Operation(String),

    #[error("Redis error: {0}")]
    Redis(#[from] deadpool_redis::redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),
}

impl CacheError {
    pub fn decode(key: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CacheError::Config("redis_url required".to_string());
        assert_eq!(
            err.to_string(),
            "Cache configuration error: redis_url required"
        );
    }

    #[test]
    fn test_decode_error_names_key() {
        let err = CacheError::decode("Assignment:a1", "invalid marker");
        assert_eq!(
            err.to_string(),
            "Failed to decode cached value for 'Assignment:a1': invalid marker"
        );
    }

    #[test]
    fn test_operation_error_display() {
        let err = CacheError::Operation("scan failed".to_string());
        assert_eq!(err.to_string(), "Cache operation failed: scan failed");
    }
}
