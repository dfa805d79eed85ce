//! Integration test: write a scene to Zarr V3 on disk, index it and load it back.
//!
//! 1. Write an int16 raster with a few nodata holes
//! 2. Index a metadata document pointing at the store
//! 3. Load the tile through `ZarrRasterSource`
//! 4. Verify the values and holes survive

use std::sync::Arc;

use zarrs::array::{ArrayBuilder, DataType as ZarrDataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use cube_common::{BoundingBox, CrsCode, DataType, FusionPolicy, GridSpec, Measurement, Product};
use grid_processor::{index_document, LoadRequest, Loader, LoaderConfig, ZarrRasterSource};
use storage::{Catalog, MemoryCatalog};
use test_utils::{punch_holes, ramp_values, temp_test_dir_with_prefix, SceneDoc};

const NODATA: i16 = -999;

/// Write a single-chunk-per-block int16 array at `array_path` inside `store_dir`.
fn write_zarr_array(
    store_dir: &std::path::Path,
    array_path: &str,
    data: &[i16],
    width: usize,
    height: usize,
    chunk_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(store_dir)?;
    let store = Arc::new(FilesystemStore::new(store_dir)?);

    let array = ArrayBuilder::new(
        vec![height as u64, width as u64], // shape [rows, cols]
        ZarrDataType::Int16,
        vec![chunk_size as u64, chunk_size as u64].try_into()?,
        FillValue::from(NODATA),
    )
    .attributes({
        let mut attrs = serde_json::Map::new();
        attrs.insert("units".to_string(), serde_json::json!("1"));
        attrs
    })
    .build(store.clone(), array_path)?;

    array.store_metadata()?;

    let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![height as u64, width as u64])?;
    array.store_array_subset_elements(&subset, data)?;

    Ok(())
}

fn product() -> Product {
    Product {
        name: "scenes".to_string(),
        description: String::new(),
        measurements: vec![Measurement::new("red", DataType::Int16, NODATA as f32)],
        fusion: FusionPolicy::Overwrite,
        grid: Some(GridSpec::new(CrsCode::Epsg3577, (25.0, -25.0), (1000.0, 1000.0)).unwrap()),
        storage: None,
    }
}

#[tokio::test]
async fn test_zarr_scene_round_trip() {
    let (width, height) = (40, 40);
    let holes = [(3usize, 4usize), (20, 20), (39, 0)];

    let mut values = ramp_values(height, width);
    punch_holes(&mut values, width, &holes, NODATA as f32);
    let data: Vec<i16> = values.iter().map(|&v| v as i16).collect();

    let dir = temp_test_dir_with_prefix("cube_zarr_");
    write_zarr_array(&dir.path().join("scene.zarr"), "/red", &data, width, height, 16)
        .expect("Failed to write Zarr array");

    let catalog = Arc::new(MemoryCatalog::new());
    catalog.add_product(&product()).await.unwrap();
    let doc = SceneDoc::new("scenes")
        .band("red", "scene.zarr", Some("red"))
        .build();
    let record = index_document("scenes", doc).unwrap();
    catalog.add_dataset(&record).await.unwrap();

    let loader = Loader::new(
        catalog,
        Arc::new(ZarrRasterSource::new(dir.path())),
        LoaderConfig::default(),
    );
    let request = LoadRequest::new("scenes").extent(
        BoundingBox::new(100.0, 100.0, 900.0, 900.0),
        CrsCode::Epsg3577,
    );
    let plan = loader.load(&request).await.unwrap();
    assert_eq!(plan.len(), 1);

    let tile = plan.load_tile(&plan.keys()[0]).await.unwrap();
    assert!(tile.warnings.is_empty(), "unexpected warnings: {:?}", tile.warnings);
    assert_eq!(tile.datasets, vec![record.id]);

    let red = tile.get("red").unwrap();
    assert_eq!(red.data.len(), width * height);
    for (i, (&got, &want)) in red.data.iter().zip(&data).enumerate() {
        assert_eq!(got, want as f32, "pixel {}", i);
    }
    assert_eq!(red.valid_count(), width * height - holes.len());
}

#[tokio::test]
async fn test_missing_zarr_store_is_reported() {
    let dir = temp_test_dir_with_prefix("cube_zarr_");

    let catalog = Arc::new(MemoryCatalog::new());
    catalog.add_product(&product()).await.unwrap();
    let doc = SceneDoc::new("scenes")
        .band("red", "gone.zarr", Some("red"))
        .build();
    let record = index_document("scenes", doc).unwrap();
    catalog.add_dataset(&record).await.unwrap();

    let loader = Loader::new(
        catalog,
        Arc::new(ZarrRasterSource::new(dir.path())),
        LoaderConfig::default(),
    );
    let plan = loader.load(&LoadRequest::new("scenes")).await.unwrap();
    assert_eq!(plan.len(), 1);

    let tile = plan.load_tile(&plan.keys()[0]).await.unwrap();
    assert_eq!(tile.warnings.len(), 1);
    assert_eq!(tile.warnings[0].dataset, Some(record.id));
    assert!(tile.datasets.is_empty());
    assert_eq!(tile.get("red").unwrap().valid_count(), 0);
}
