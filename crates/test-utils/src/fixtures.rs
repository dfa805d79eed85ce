//! Common test fixtures for geocube tests.
//!
//! Dataset metadata documents and product definitions shaped like the ones
//! the catalog stores, so tests do not repeat JSON and YAML by hand.

use serde_json::{json, Value};

/// Common extents for testing.
pub mod bbox {
    /// Around Canberra, in EPSG:4326 (lon/lat).
    pub const CANBERRA: (f64, f64, f64, f64) = (149.0, -35.5, 149.3, -35.2);

    /// A 10 km square in EPSG:3577 (Australian Albers).
    pub const ALBERS_10KM: (f64, f64, f64, f64) = (1_500_000.0, -3_910_000.0, 1_510_000.0, -3_900_000.0);

    /// Invalid bbox (min > max)
    pub const INVALID: (f64, f64, f64, f64) = (10.0, 10.0, 5.0, 5.0);
}

/// Ingestion configuration for a Landsat 8 surface reflectance product.
pub const LS8_INGEST_YAML: &str = r#"
output_type: ls8_nbar_albers
description: Landsat 8 NBAR 25 metre, 100km tile, Australian Albers
fusion: overwrite
storage:
  driver: zarr
  crs: EPSG:3577
  tile_size:
    x: 100000.0
    y: 100000.0
  resolution:
    x: 25
    y: -25
  chunking:
    x: 200
    y: 200
    time: 1
  dimension_order: [time, y, x]
measurements:
  - name: red
    dtype: int16
    nodata: -999
    resampling_method: nearest
    src_varname: band_4
    units: '1'
    aliases: [band_4]
  - name: nir
    dtype: int16
    nodata: -999
    resampling_method: nearest
    src_varname: band_5
    units: '1'
"#;

/// Builder for a dataset metadata document.
///
/// Defaults to a 40 x 40 pixel, 25 metre north-up raster in EPSG:3577
/// with its upper-left corner at `(0, 1000)`.
#[derive(Debug, Clone)]
pub struct SceneDoc {
    product: String,
    time: Value,
    crs: String,
    geotransform: [f64; 6],
    shape: [usize; 2],
    footprint: Option<Vec<[f64; 2]>>,
    measurements: Vec<(String, String, Option<String>)>,
    id: Option<String>,
}

impl SceneDoc {
    pub fn new(product: &str) -> Self {
        Self {
            product: product.to_string(),
            time: json!("2020-01-01T00:00:00Z"),
            crs: "EPSG:3577".to_string(),
            geotransform: [0.0, 25.0, 0.0, 1000.0, 0.0, -25.0],
            shape: [40, 40],
            footprint: None,
            measurements: Vec::new(),
            id: None,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn time(mut self, time: &str) -> Self {
        self.time = json!(time);
        self
    }

    pub fn interval(mut self, begin: &str, end: &str) -> Self {
        self.time = json!({"begin": begin, "end": end});
        self
    }

    pub fn crs(mut self, crs: &str) -> Self {
        self.crs = crs.to_string();
        self
    }

    /// Raster with upper-left corner `(x0, y0)`, pixel size `res` and `shape` (height, width).
    pub fn raster(mut self, x0: f64, y0: f64, res: f64, shape: [usize; 2]) -> Self {
        self.geotransform = [x0, res, 0.0, y0, 0.0, -res];
        self.shape = shape;
        self
    }

    pub fn footprint(mut self, ring: &[(f64, f64)]) -> Self {
        self.footprint = Some(ring.iter().map(|&(x, y)| [x, y]).collect());
        self
    }

    /// Map a measurement (or source name) to a file path and variable.
    pub fn band(mut self, name: &str, path: &str, variable: Option<&str>) -> Self {
        self.measurements
            .push((name.to_string(), path.to_string(), variable.map(str::to_string)));
        self
    }

    pub fn build(self) -> Value {
        let mut measurements = serde_json::Map::new();
        for (name, path, variable) in self.measurements {
            let mut locator = json!({ "path": path });
            if let Some(v) = variable {
                locator["variable"] = json!(v);
            }
            measurements.insert(name, locator);
        }

        let mut doc = json!({
            "product": self.product,
            "time": self.time,
            "crs": self.crs,
            "geotransform": self.geotransform,
            "shape": self.shape,
            "measurements": measurements,
        });
        if let Some(fp) = self.footprint {
            doc["footprint"] = json!(fp);
        }
        if let Some(id) = self.id {
            doc["id"] = json!(id);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_doc_defaults() {
        let doc = SceneDoc::new("p").band("red", "a.zarr", Some("red")).build();
        assert_eq!(doc["crs"], "EPSG:3577");
        assert_eq!(doc["shape"], json!([40, 40]));
        assert_eq!(doc["measurements"]["red"]["variable"], "red");
        assert!(doc.get("footprint").is_none());
    }

    #[test]
    fn test_scene_doc_overrides() {
        let doc = SceneDoc::new("p")
            .raster(100.0, 200.0, 10.0, [5, 6])
            .interval("2020-01-01T00:00:00Z", "2020-01-01T00:00:10Z")
            .footprint(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)])
            .build();
        assert_eq!(doc["geotransform"], json!([100.0, 10.0, 0.0, 200.0, 0.0, -10.0]));
        assert_eq!(doc["time"]["end"], "2020-01-01T00:00:10Z");
        assert_eq!(doc["footprint"].as_array().unwrap().len(), 3);
    }
}
