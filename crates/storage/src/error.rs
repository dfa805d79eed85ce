//! Storage error types.

use cube_common::CubeError;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid catalog record: {0}")]
    InvalidRecord(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),
}

impl StorageError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::InvalidRecord(err.to_string())
    }
}

impl From<StorageError> for CubeError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(msg) => CubeError::CatalogUnavailable(msg),
            StorageError::InvalidRecord(msg) => CubeError::Configuration(msg),
            StorageError::ProductNotFound(name) => CubeError::ProductNotFound(name),
        }
    }
}
