//! Catalog interface: products and indexed dataset records.

use async_trait::async_trait;
use cube_common::{BoundingBox, Product, TimeRange, TimeSpan};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;

/// One indexed dataset as stored in the catalog.
///
/// `time` and `bbox` are search columns derived from the metadata document
/// at indexing time. Records without them are never filtered out by time or
/// space; the query layer applies its exact filter on the parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: Uuid,
    pub product: String,
    #[serde(default)]
    pub time: Option<TimeSpan>,
    /// Geographic (EPSG:4326) bounds of the footprint.
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    pub metadata: serde_json::Value,
}

impl DatasetRecord {
    /// Whether this record passes the coarse catalog filter.
    pub fn matches(&self, query: &DatasetQuery) -> bool {
        if self.product != query.product {
            return false;
        }
        if let (Some(range), Some(span)) = (&query.time_range, &self.time) {
            if !range.overlaps(span) {
                return false;
            }
        }
        if let (Some(wanted), Some(bbox)) = (&query.bbox, &self.bbox) {
            // Inclusive: edge-touching candidates are left to the exact filter.
            if bbox.max_x < wanted.min_x
                || bbox.min_x > wanted.max_x
                || bbox.max_y < wanted.min_y
                || bbox.min_y > wanted.max_y
            {
                return false;
            }
        }
        true
    }
}

/// Query parameters for finding datasets.
#[derive(Debug, Clone, Default)]
pub struct DatasetQuery {
    pub product: String,
    pub time_range: Option<TimeRange>,
    /// Geographic (EPSG:4326) search box.
    pub bbox: Option<BoundingBox>,
}

impl DatasetQuery {
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            ..Default::default()
        }
    }

    pub fn with_time_range(mut self, range: Option<TimeRange>) -> Self {
        self.time_range = range;
        self
    }

    pub fn with_bbox(mut self, bbox: Option<BoundingBox>) -> Self {
        self.bbox = bbox;
        self
    }
}

/// Metadata catalog holding product definitions and dataset records.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Records of the query's product overlapping its time range and bbox,
    /// ordered by begin time then id.
    async fn search(&self, query: &DatasetQuery) -> StorageResult<Vec<DatasetRecord>>;

    async fn get_product(&self, name: &str) -> StorageResult<Product>;

    /// All product definitions, sorted by name.
    async fn list_products(&self) -> StorageResult<Vec<Product>>;

    /// Insert or replace a product definition.
    async fn add_product(&self, product: &Product) -> StorageResult<()>;

    /// Insert or replace a dataset record.
    async fn add_dataset(&self, record: &DatasetRecord) -> StorageResult<()>;
}

/// Sort key used by every backend for search results.
pub(crate) fn record_order(a: &DatasetRecord, b: &DatasetRecord) -> std::cmp::Ordering {
    let begin = |r: &DatasetRecord| r.time.map(|t| t.begin);
    begin(a).cmp(&begin(b)).then_with(|| a.id.cmp(&b.id))
}
