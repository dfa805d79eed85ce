//! Common types and utilities shared across all geocube crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod ingest_config;
pub mod product;
pub mod time;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{CubeError, CubeResult};
pub use grid::{GridSpec, TileIndex};
pub use ingest_config::IngestionConfig;
pub use product::{DataType, FusionPolicy, Measurement, Product, ResamplingMethod, StorageLayout};
pub use time::{parse_datetime, TimeGrouping, TimeRange, TimeSpan};
