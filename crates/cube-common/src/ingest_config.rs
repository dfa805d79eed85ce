//! Ingestion configuration documents.
//!
//! Ingestion writes tiled storage according to a YAML document like:
//!
//! ```yaml
//! output_type: ls8_nbar_albers
//! description: Landsat 8 surface reflectance, 25 m Albers tiles
//! storage:
//!   crs: EPSG:3577
//!   tile_size: {x: 100000.0, y: 100000.0}
//!   resolution: {x: 25, y: -25}
//!   chunking: {x: 200, y: 200, time: 1}
//!   dimension_order: [time, y, x]
//! measurements:
//!   - name: red
//!     dtype: int16
//!     nodata: -999
//!     resampling_method: nearest
//!     src_varname: band_4
//! ```
//!
//! The same document is the authoritative definition of the product and its
//! default grid on the query side.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::crs::CrsCode;
use crate::error::{CubeError, CubeResult};
use crate::grid::GridSpec;
use crate::product::{FusionPolicy, Measurement, Product, StorageLayout};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisPair {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSection {
    pub crs: String,
    pub tile_size: AxisPair,
    pub resolution: AxisPair,
    #[serde(default)]
    pub origin: Option<AxisPair>,
    #[serde(default)]
    pub chunking: BTreeMap<String, usize>,
    #[serde(default)]
    pub dimension_order: Option<Vec<String>>,
    #[serde(default)]
    pub driver: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(alias = "name")]
    pub output_type: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fusion: FusionPolicy,
    pub storage: StorageSection,
    pub measurements: Vec<Measurement>,
}

impl IngestionConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> CubeResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> CubeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CubeError::configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Default grid described by the storage section.
    pub fn grid_spec(&self) -> CubeResult<GridSpec> {
        let storage = &self.storage;
        let crs = CrsCode::parse(&storage.crs)?;
        // Tile sizes are sometimes written with the sign of the resolution.
        let grid = GridSpec::new(
            crs,
            (storage.resolution.x, storage.resolution.y),
            (storage.tile_size.x.abs(), storage.tile_size.y.abs()),
        )?;
        match storage.origin {
            Some(origin) => grid.with_origin((origin.x, origin.y)),
            None => Ok(grid),
        }
    }

    /// Build and validate the product this document defines.
    pub fn into_product(self) -> CubeResult<Product> {
        let grid = self.grid_spec()?;
        let storage = StorageLayout {
            chunking: self.storage.chunking.clone(),
            dimension_order: self
                .storage
                .dimension_order
                .clone()
                .unwrap_or_else(|| vec!["time".into(), "y".into(), "x".into()]),
        };

        let product = Product {
            name: self.output_type,
            description: self.description,
            measurements: self.measurements,
            fusion: self.fusion,
            grid: Some(grid),
            storage: Some(storage),
        };
        product.validate()?;
        Ok(product)
    }
}
