//! Query-to-array loading engine.
//!
//! Turns a product query (time range, extent, output grid, measurements)
//! into a lazily produced sequence of gridded, multi-band tiles:
//!
//! - **Partial reads**: only the window of each source raster under a tile is read
//! - **Reprojection**: sources in any supported CRS are resampled onto the output grid
//! - **Fusion**: overlapping datasets are combined per the product's fusion policy
//!
//! # Architecture
//!
//! ```text
//! LoadRequest
//!      │
//!      ▼
//! Loader::load(request)
//!      │
//!      ├─► SpatialIndexQuery::find_datasets   (catalog search + exact footprint filter)
//!      │
//!      ├─► CellResolver::resolve              ((time group, tile) -> ordered datasets)
//!      │
//!      └─► LoadPlan (keys only, nothing read yet)
//!               │
//!               ▼  load_tile(key) / stream(n)
//!          for each measurement:
//!               for each dataset (lowest priority first):
//!                    SourceWindowReader::read_window   (window read + resample)
//!               FusionAccumulator::finish
//!               │
//!               ▼
//!          AssembledTile
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_processor::{LoadRequest, Loader, LoaderConfig, ZarrRasterSource};
//!
//! let loader = Loader::new(catalog, Arc::new(ZarrRasterSource::new("/data")), LoaderConfig::from_env());
//! let request = LoadRequest::new("ls8_nbar_albers")
//!     .extent(BoundingBox::new(149.0, -35.5, 149.2, -35.3), CrsCode::Epsg4326)
//!     .measurements(["red", "nir"]);
//!
//! let plan = loader.load(&request).await?;
//! let mut tiles = plan.stream(4);
//! while let Some(tile) = tiles.next().await {
//!     let tile = tile?;
//!     // ...
//! }
//! ```

pub mod assembler;
pub mod config;
pub mod dataset;
pub mod error;
pub mod fusion;
pub mod query;
pub mod reader;
pub mod resample;
pub mod resolver;
pub mod source;
pub mod types;

// Re-export commonly used types at crate root
pub use assembler::{LoadPlan, LoadRequest, Loader};
pub use config::LoaderConfig;
pub use dataset::{index_document, overlaps_interior, Dataset, SourceLocator};
pub use error::{GridProcessorError, Result};
pub use fusion::{fuse, FusionAccumulator};
pub use query::{QueryResult, SpatialIndexQuery};
pub use reader::{SourceWindow, SourceWindowReader};
pub use resolver::{CellContributions, CellResolver};
pub use source::{
    MemoryRaster, MemoryRasterSource, PixelWindow, RasterHandle, RasterSource, WindowData,
    ZarrRasterSource,
};
pub use types::{
    AssembledTile, DatasetOrdering, LoadWarning, MeasurementArray, QueryDescriptor, TileKey,
    WarningKind,
};
