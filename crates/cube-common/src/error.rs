//! Error types for geocube crates.

use thiserror::Error;

/// Result type alias using CubeError.
pub type CubeResult<T> = Result<T, CubeError>;

/// Primary error type shared by the catalog, grid and product layers.
#[derive(Debug, Error)]
pub enum CubeError {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid CRS: {0}")]
    InvalidCrs(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Unknown measurement '{measurement}' for product '{product}'")]
    UnknownMeasurement { product: String, measurement: String },

    // === Catalog Errors ===
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    // === Data Errors ===
    #[error("Failed to read source for dataset {dataset}: {message}")]
    SourceRead { dataset: String, message: String },
}

impl CubeError {
    /// Create a Configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a CatalogUnavailable error.
    pub fn catalog_unavailable(msg: impl Into<String>) -> Self {
        Self::CatalogUnavailable(msg.into())
    }

    /// Taxonomy name reported to callers alongside warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            CubeError::Configuration(_)
            | CubeError::InvalidCrs(_)
            | CubeError::InvalidGrid(_)
            | CubeError::InvalidTime(_)
            | CubeError::ProductNotFound(_)
            | CubeError::UnknownMeasurement { .. } => "ConfigurationError",
            CubeError::CatalogUnavailable(_) => "CatalogUnavailableError",
            CubeError::SourceRead { .. } => "SourceReadError",
        }
    }

    /// Whether a query can continue after this error by dropping one dataset.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CubeError::SourceRead { .. })
    }
}

impl From<serde_json::Error> for CubeError {
    fn from(err: serde_json::Error) -> Self {
        CubeError::Configuration(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for CubeError {
    fn from(err: serde_yaml::Error) -> Self {
        CubeError::Configuration(format!("YAML error: {}", err))
    }
}
