//! Indexed datasets parsed from catalog metadata documents.

use std::collections::BTreeMap;

use geo::{BoundingRect, Centroid, Coord, Intersects, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cube_common::{parse_datetime, BoundingBox, CrsCode, Measurement, TimeGrouping, TimeSpan};
use projection::{densify_ring, GeoTransform, Transformer};
use storage::DatasetRecord;

use chrono::{DateTime, Utc};

use crate::error::{GridProcessorError, Result};

/// Where the pixels of one measurement of a dataset live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocator {
    /// Path of the raster, relative to the raster source's root.
    pub path: String,
    /// Variable (array) inside the raster; the raster root when absent.
    #[serde(default)]
    pub variable: Option<String>,
}

impl SourceLocator {
    pub fn new(path: impl Into<String>, variable: Option<&str>) -> Self {
        Self {
            path: path.into(),
            variable: variable.map(str::to_string),
        }
    }
}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.variable {
            Some(v) => write!(f, "{}:{}", self.path, v),
            None => write!(f, "{}", self.path),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TimeField {
    Instant(String),
    Interval { begin: String, end: String },
}

/// Wire form of a dataset metadata document.
#[derive(Debug, Deserialize)]
struct DatasetDocument {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    product: Option<String>,
    time: Option<TimeField>,
    crs: Option<String>,
    #[serde(default)]
    footprint: Option<Vec<[f64; 2]>>,
    geotransform: Option<[f64; 6]>,
    shape: Option<[usize; 2]>,
    #[serde(default)]
    measurements: BTreeMap<String, SourceLocator>,
}

/// One indexed observation, read-only to the engine.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: Uuid,
    pub product: String,
    pub time: TimeSpan,
    pub crs: CrsCode,
    /// Footprint polygon in the dataset's native CRS.
    pub footprint: Polygon<f64>,
    pub transform: GeoTransform,
    /// Native raster shape (height, width).
    pub shape: (usize, usize),
    pub measurements: BTreeMap<String, SourceLocator>,
    /// Longitude of the footprint centroid, used for solar-day grouping.
    pub centroid_lon: f64,
}

impl Dataset {
    /// Parse a catalog record's metadata document.
    pub fn from_record(record: &DatasetRecord) -> Result<Self> {
        Self::from_document(record.id, &record.product, &record.metadata)
    }

    /// Parse a metadata document; `id` and `product` are used when the document omits them.
    pub fn from_document(id: Uuid, product: &str, doc: &serde_json::Value) -> Result<Self> {
        let doc: DatasetDocument = serde_json::from_value(doc.clone())?;

        let time = match doc.time {
            Some(TimeField::Instant(s)) => TimeSpan::instant(parse_datetime(&s)?),
            Some(TimeField::Interval { begin, end }) => {
                TimeSpan::new(parse_datetime(&begin)?, parse_datetime(&end)?)
            }
            None => return Err(GridProcessorError::invalid_metadata("missing time")),
        };

        let crs = doc
            .crs
            .as_deref()
            .ok_or_else(|| GridProcessorError::invalid_metadata("missing crs"))
            .and_then(|s| CrsCode::parse(s).map_err(GridProcessorError::from))?;

        let gt = doc
            .geotransform
            .ok_or_else(|| GridProcessorError::invalid_metadata("missing geotransform"))?;
        let transform = GeoTransform::from_gdal(gt)?;

        let [height, width] = doc
            .shape
            .ok_or_else(|| GridProcessorError::invalid_metadata("missing shape"))?;
        if height == 0 || width == 0 {
            return Err(GridProcessorError::invalid_metadata("shape must be non-empty"));
        }

        if doc.measurements.is_empty() {
            return Err(GridProcessorError::invalid_metadata("no measurements"));
        }

        let ring: Vec<(f64, f64)> = match doc.footprint {
            Some(points) => points.iter().map(|p| (p[0], p[1])).collect(),
            None => transform.outline(height, width),
        };
        let footprint = ring_to_polygon(&ring).ok_or_else(|| {
            GridProcessorError::invalid_metadata("footprint needs at least 3 finite points")
        })?;

        let centroid_lon = geographic_centroid_lon(&footprint, crs)
            .ok_or_else(|| GridProcessorError::invalid_metadata("footprint has no centroid"))?;

        Ok(Self {
            id: doc.id.unwrap_or(id),
            product: doc.product.unwrap_or_else(|| product.to_string()),
            time,
            crs,
            footprint,
            transform,
            shape: (height, width),
            measurements: doc.measurements,
            centroid_lon,
        })
    }

    /// Source of a measurement, looked up by name, source variable name or alias.
    pub fn locator(&self, measurement: &Measurement) -> Option<&SourceLocator> {
        measurement
            .source_names()
            .find_map(|name| self.measurements.get(name))
    }

    /// Footprint transformed into `crs`, edges densified.
    pub fn footprint_in(&self, crs: CrsCode, densify: usize) -> Result<Polygon<f64>> {
        if crs == self.crs {
            return Ok(self.footprint.clone());
        }
        let transformer = Transformer::new(self.crs, crs);
        let ring = densify_ring(&polygon_ring(&self.footprint), densify);
        ring_to_polygon(&transformer.transform_points(&ring)).ok_or_else(|| {
            GridProcessorError::Projection(format!(
                "footprint of {} cannot be expressed in {}",
                self.id, crs
            ))
        })
    }

    /// Bounds of the footprint in EPSG:4326.
    pub fn geographic_bbox(&self, densify: usize) -> Option<BoundingBox> {
        self.footprint_in(CrsCode::Epsg4326, densify)
            .ok()
            .as_ref()
            .and_then(polygon_bbox)
    }

    /// Output time coordinate of this dataset under a grouping.
    pub fn group_key(&self, grouping: TimeGrouping) -> DateTime<Utc> {
        grouping.group_key(&self.time, self.centroid_lon)
    }
}

/// Build the catalog record for a metadata document.
///
/// Validates the document, assigns an id when it has none and derives the
/// time and geographic search columns.
pub fn index_document(product: &str, mut doc: serde_json::Value) -> Result<DatasetRecord> {
    let id = doc
        .get("id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("id".to_string(), serde_json::json!(id.to_string()));
    }

    let dataset = Dataset::from_document(id, product, &doc)?;
    if dataset.product != product {
        return Err(GridProcessorError::invalid_metadata(format!(
            "document belongs to product '{}', not '{}'",
            dataset.product, product
        )));
    }

    Ok(DatasetRecord {
        id,
        product: product.to_string(),
        time: Some(dataset.time),
        bbox: dataset.geographic_bbox(20),
        metadata: doc,
    })
}

/// Polygon from an open or closed ring; non-finite points are dropped.
pub(crate) fn ring_to_polygon(ring: &[(f64, f64)]) -> Option<Polygon<f64>> {
    let points: Vec<(f64, f64)> = ring
        .iter()
        .copied()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();
    if points.len() < 3 {
        return None;
    }
    Some(Polygon::new(LineString::from(points), vec![]))
}

/// Exterior ring of a polygon, without the closing point.
pub(crate) fn polygon_ring(polygon: &Polygon<f64>) -> Vec<(f64, f64)> {
    let mut ring: Vec<(f64, f64)> = polygon.exterior().coords().map(|c| (c.x, c.y)).collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

pub(crate) fn polygon_bbox(polygon: &Polygon<f64>) -> Option<BoundingBox> {
    polygon
        .bounding_rect()
        .map(|r| BoundingBox::new(r.min().x, r.min().y, r.max().x, r.max().y))
}

pub(crate) fn bbox_polygon(bbox: &BoundingBox) -> Polygon<f64> {
    Rect::new(
        Coord {
            x: bbox.min_x,
            y: bbox.min_y,
        },
        Coord {
            x: bbox.max_x,
            y: bbox.max_y,
        },
    )
    .to_polygon()
}

/// Whether a polygon and a box share interior area.
///
/// Shapes that only touch along an edge or at a corner do not overlap.
pub fn overlaps_interior(polygon: &Polygon<f64>, bbox: &BoundingBox) -> bool {
    let eps = 1e-9 * bbox.width().abs().max(bbox.height().abs()).max(1.0);
    if bbox.width() <= 2.0 * eps || bbox.height() <= 2.0 * eps {
        return false;
    }
    match polygon_bbox(polygon) {
        Some(pb) if pb.intersects(bbox) => {}
        _ => return false,
    }
    polygon.intersects(&bbox_polygon(&bbox.expand(-eps)))
}

fn geographic_centroid_lon(footprint: &Polygon<f64>, crs: CrsCode) -> Option<f64> {
    let centroid = footprint.centroid()?;
    let (lon, _) = Transformer::new(crs, CrsCode::Epsg4326).transform(centroid.x(), centroid.y());
    lon.is_finite().then_some(lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> serde_json::Value {
        json!({
            "product": "ls8_nbar_albers",
            "time": {"begin": "2016-01-01T00:00:00Z", "end": "2016-01-01T00:00:10Z"},
            "crs": "EPSG:3577",
            "geotransform": [1500000.0, 25.0, 0.0, -3900000.0, 0.0, -25.0],
            "shape": [400, 400],
            "measurements": {"band_4": {"path": "scene1.zarr", "variable": "red"}}
        })
    }

    #[test]
    fn test_parse_document() {
        let id = Uuid::new_v4();
        let ds = Dataset::from_document(id, "ls8_nbar_albers", &doc()).unwrap();
        assert_eq!(ds.id, id);
        assert_eq!(ds.crs, CrsCode::Epsg3577);
        assert_eq!(ds.shape, (400, 400));

        let bbox = polygon_bbox(&ds.footprint).unwrap();
        assert_eq!(bbox, BoundingBox::new(1_500_000.0, -3_910_000.0, 1_510_000.0, -3_900_000.0));
        assert!(ds.centroid_lon > 130.0 && ds.centroid_lon < 160.0);
    }

    #[test]
    fn test_instant_time() {
        let mut d = doc();
        d["time"] = json!("2016-03-04T05:06:07Z");
        let ds = Dataset::from_document(Uuid::new_v4(), "p", &d).unwrap();
        assert_eq!(ds.time.begin, ds.time.end);
    }

    #[test]
    fn test_malformed_documents() {
        for field in ["time", "crs", "geotransform", "shape", "measurements"] {
            let mut d = doc();
            d.as_object_mut().unwrap().remove(field);
            assert!(
                Dataset::from_document(Uuid::new_v4(), "p", &d).is_err(),
                "missing {} should fail",
                field
            );
        }

        let mut d = doc();
        d["crs"] = json!("EPSG:99999");
        assert!(Dataset::from_document(Uuid::new_v4(), "p", &d).is_err());

        let mut d = doc();
        d["footprint"] = json!([[0.0, 0.0], [1.0, 1.0]]);
        assert!(Dataset::from_document(Uuid::new_v4(), "p", &d).is_err());
    }

    #[test]
    fn test_locator_by_source_name() {
        let ds = Dataset::from_document(Uuid::new_v4(), "p", &doc()).unwrap();
        let red = Measurement {
            src_varname: Some("band_4".into()),
            ..Measurement::new("red", cube_common::DataType::Int16, -999.0)
        };
        assert_eq!(ds.locator(&red).unwrap().path, "scene1.zarr");

        let blue = Measurement::new("blue", cube_common::DataType::Int16, -999.0);
        assert!(ds.locator(&blue).is_none());
    }

    #[test]
    fn test_overlaps_interior_excludes_touching() {
        let square = ring_to_polygon(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]).unwrap();

        assert!(overlaps_interior(&square, &BoundingBox::new(5.0, 5.0, 15.0, 15.0)));
        assert!(overlaps_interior(&square, &BoundingBox::new(2.0, 2.0, 3.0, 3.0)));
        // Shared edge and shared corner.
        assert!(!overlaps_interior(&square, &BoundingBox::new(10.0, 0.0, 20.0, 10.0)));
        assert!(!overlaps_interior(&square, &BoundingBox::new(10.0, 10.0, 20.0, 20.0)));
        assert!(!overlaps_interior(&square, &BoundingBox::new(20.0, 20.0, 30.0, 30.0)));
    }

    #[test]
    fn test_index_document() {
        let record = index_document("ls8_nbar_albers", doc()).unwrap();
        assert_eq!(record.product, "ls8_nbar_albers");
        assert_eq!(record.metadata["id"], json!(record.id.to_string()));
        let bbox = record.bbox.unwrap();
        assert!(bbox.min_x > 130.0 && bbox.max_x < 160.0);
        assert!(bbox.max_y < 0.0);

        assert!(index_document("other_product", doc()).is_err());
    }
}
