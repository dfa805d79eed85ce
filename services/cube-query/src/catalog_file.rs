//! File-backed catalog.
//!
//! A YAML document of product ingestion configs and dataset metadata
//! documents, loaded into an in-memory catalog:
//!
//! ```yaml
//! products:
//!   - output_type: ls8_nbar_albers
//!     storage: {crs: EPSG:3577, tile_size: {x: 100000, y: 100000}, resolution: {x: 25, y: -25}}
//!     measurements:
//!       - {name: red, dtype: int16, nodata: -999}
//! datasets:
//!   - product: ls8_nbar_albers
//!     time: 2016-01-01T00:00:00Z
//!     crs: EPSG:3577
//!     geotransform: [1500000, 25, 0, -3900000, 0, -25]
//!     shape: [4000, 4000]
//!     measurements:
//!       red: {path: LS8_2016_01_01.zarr, variable: red}
//! ```

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use cube_common::IngestionConfig;
use grid_processor::index_document;
use storage::{Catalog, MemoryCatalog};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    products: Vec<IngestionConfig>,
    #[serde(default)]
    datasets: Vec<serde_json::Value>,
}

/// Parse a catalog document and index its contents.
///
/// Product definitions must be valid. Dataset documents that fail to index
/// are skipped with a warning, the same way the query layer treats
/// malformed catalog records.
pub async fn load_catalog(yaml: &str) -> Result<MemoryCatalog> {
    let file: CatalogFile = serde_yaml::from_str(yaml).context("invalid catalog file")?;
    let catalog = MemoryCatalog::new();

    for config in file.products {
        let name = config.output_type.clone();
        let product = config
            .into_product()
            .with_context(|| format!("invalid product '{}'", name))?;
        catalog.add_product(&product).await?;
    }

    let mut indexed = 0usize;
    for (i, doc) in file.datasets.into_iter().enumerate() {
        let Some(product) = doc.get("product").and_then(|p| p.as_str()).map(str::to_string) else {
            warn!(index = i, "Skipping dataset document without a product");
            continue;
        };
        match index_document(&product, doc) {
            Ok(record) => {
                catalog.add_dataset(&record).await?;
                indexed += 1;
            }
            Err(e) => warn!(index = i, product = %product, error = %e, "Skipping dataset document"),
        }
    }

    info!(datasets = indexed, "Loaded catalog file");
    Ok(catalog)
}

/// Read and load a catalog file from disk.
pub async fn load_catalog_file(path: impl AsRef<Path>) -> Result<MemoryCatalog> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("failed to read {}: {}", path.display(), e))?;
    load_catalog(&content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{SceneDoc, LS8_INGEST_YAML};

    fn catalog_yaml(datasets: &[serde_json::Value]) -> String {
        let products: serde_yaml::Value = serde_yaml::from_str(LS8_INGEST_YAML).unwrap();
        let doc = serde_json::json!({
            "products": [serde_json::to_value(products).unwrap()],
            "datasets": datasets,
        });
        serde_yaml::to_string(&doc).unwrap()
    }

    #[tokio::test]
    async fn test_load_catalog() {
        let good = SceneDoc::new("ls8_nbar_albers")
            .raster(1_500_000.0, -3_900_000.0, 25.0, [400, 400])
            .band("red", "a.zarr", Some("red"))
            .build();
        let mut bad = good.clone();
        bad.as_object_mut().unwrap().remove("crs");

        let catalog = load_catalog(&catalog_yaml(&[good, bad])).await.unwrap();
        assert_eq!(catalog.dataset_count().await, 1);

        let product = catalog.get_product("ls8_nbar_albers").await.unwrap();
        assert_eq!(product.measurements.len(), 2);
        assert!(product.grid.is_some());
    }

    #[tokio::test]
    async fn test_invalid_product_fails() {
        let yaml = "products:\n  - output_type: broken\n    storage: {crs: EPSG:3577, tile_size: {x: 10, y: 10}, resolution: {x: 3, y: -3}}\n    measurements: []\n";
        assert!(load_catalog(yaml).await.is_err());
    }

    #[tokio::test]
    async fn test_load_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, catalog_yaml(&[])).unwrap();

        let catalog = load_catalog_file(&path).await.unwrap();
        assert_eq!(catalog.list_products().await.unwrap().len(), 1);
        assert!(load_catalog_file(dir.path().join("missing.yaml")).await.is_err());
    }
}
