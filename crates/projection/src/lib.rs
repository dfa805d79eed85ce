//! Coordinate reference system transformations.
//!
//! Implements the map projections used by geocube grids from scratch,
//! without external projection libraries. Every projected CRS is reached
//! through geographic (lon/lat) coordinates on its own ellipsoid.

pub mod albers;
pub mod ellipsoid;
pub mod error;
pub mod geotransform;
pub mod mercator;
pub mod transform;
pub mod transverse_mercator;

pub use albers::AlbersEqualArea;
pub use ellipsoid::Ellipsoid;
pub use error::{ProjectionError, ProjectionResult};
pub use geotransform::GeoTransform;
pub use mercator::WebMercator;
pub use transform::{densify_ring, Projection, Transformer};
pub use transverse_mercator::TransverseMercator;
