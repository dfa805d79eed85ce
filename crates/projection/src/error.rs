//! Projection error types.

use thiserror::Error;

pub type ProjectionResult<T> = Result<T, ProjectionError>;

#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The affine transform has no inverse (zero pixel size or collinear axes).
    #[error("geotransform is not invertible: {0:?}")]
    NotInvertible([f64; 6]),

    /// A transformed shape had no finite coordinates left.
    #[error("no finite coordinates after transforming to {0}")]
    OutOfDomain(String),
}
