//! Error types for the loading engine.

use cube_common::CubeError;
use projection::ProjectionError;
use storage::StorageError;
use thiserror::Error;

/// Errors that can occur while planning or loading a query.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Bad grid, product or request definition.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The catalog could not be reached or failed a query.
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// One dataset's data could not be read.
    #[error("failed to read dataset {dataset}: {message}")]
    SourceRead { dataset: String, message: String },

    /// The dataset has no source for a requested measurement.
    #[error("dataset {dataset} has no source for measurement '{measurement}'")]
    MissingMeasurement { dataset: String, measurement: String },

    /// Failed to open the raster data source.
    #[error("failed to open raster: {0}")]
    OpenFailed(String),

    /// Failed to read data from the raster.
    #[error("failed to read raster data: {0}")]
    ReadFailed(String),

    /// Invalid dataset metadata document.
    #[error("invalid dataset metadata: {0}")]
    InvalidMetadata(String),

    /// Zarr format error.
    #[error("Zarr format error: {0}")]
    ZarrError(String),

    /// Coordinate transformation failed.
    #[error("projection error: {0}")]
    Projection(String),

    /// A blocking load task panicked or was cancelled.
    #[error("load task failed: {0}")]
    Task(String),
}

impl GridProcessorError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    pub fn zarr_error(msg: impl Into<String>) -> Self {
        Self::ZarrError(msg.into())
    }

    /// Wrap a backend failure as a read error for one dataset.
    pub fn source_read(dataset: impl ToString, err: impl ToString) -> Self {
        Self::SourceRead {
            dataset: dataset.to_string(),
            message: err.to_string(),
        }
    }

    /// Taxonomy name reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) | Self::InvalidMetadata(_) => "ConfigurationError",
            Self::CatalogUnavailable(_) => "CatalogUnavailableError",
            Self::Task(_) => "TaskError",
            _ => "SourceReadError",
        }
    }

    /// Whether the load can continue by dropping the dataset involved.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SourceRead { .. } | Self::MissingMeasurement { .. }
        )
    }
}

impl From<CubeError> for GridProcessorError {
    fn from(err: CubeError) -> Self {
        match err {
            CubeError::CatalogUnavailable(msg) => Self::CatalogUnavailable(msg),
            CubeError::SourceRead { dataset, message } => Self::SourceRead { dataset, message },
            other => Self::Configuration(other.to_string()),
        }
    }
}

impl From<StorageError> for GridProcessorError {
    fn from(err: StorageError) -> Self {
        CubeError::from(err).into()
    }
}

impl From<ProjectionError> for GridProcessorError {
    fn from(err: ProjectionError) -> Self {
        Self::Projection(err.to_string())
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::ReadFailed(err.to_string())
    }
}

impl From<serde_json::Error> for GridProcessorError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for loading engine operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
