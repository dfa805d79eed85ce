//! Core types for the loading engine.

use chrono::{DateTime, Utc};
use cube_common::{BoundingBox, CrsCode, CubeError, CubeResult, DataType, TileIndex, TimeGrouping};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order in which datasets are stacked within one cell.
///
/// Fusion walks the stack from first (lowest priority) to last (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetOrdering {
    /// Oldest first, so the newest acquisition has the highest priority.
    #[default]
    TimeAscending,
    /// Newest first, so the oldest acquisition has the highest priority.
    TimeDescending,
}

impl DatasetOrdering {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> CubeResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "time_ascending" | "ascending" | "asc" => Ok(Self::TimeAscending),
            "time_descending" | "descending" | "desc" => Ok(Self::TimeDescending),
            other => Err(CubeError::configuration(format!(
                "unknown dataset ordering '{}'",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TimeAscending => "time_ascending",
            Self::TimeDescending => "time_descending",
        }
    }
}

impl std::fmt::Display for DatasetOrdering {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one element of a load: a time group and a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileKey {
    pub time: DateTime<Utc>,
    pub tile: TileIndex,
}

impl TileKey {
    pub fn new(time: DateTime<Utc>, tile: TileIndex) -> Self {
        Self { time, tile }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.time.to_rfc3339(), self.tile)
    }
}

/// Kind of a non-fatal problem met during a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// No dataset matched the query.
    EmptyResult,
    /// A catalog record could not be parsed into a dataset.
    MalformedMetadata,
    /// A dataset's pixels could not be read.
    SourceRead,
    /// A dataset has no source for a requested measurement.
    MissingMeasurement,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyResult => "EmptyResult",
            Self::MalformedMetadata => "MalformedMetadata",
            Self::SourceRead => "SourceReadError",
            Self::MissingMeasurement => "MissingMeasurement",
        }
    }
}

/// A recorded, non-fatal problem. Names the dataset that was skipped, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadWarning {
    pub kind: WarningKind,
    pub dataset: Option<Uuid>,
    pub message: String,
}

impl LoadWarning {
    pub fn new(kind: WarningKind, dataset: Option<Uuid>, message: impl Into<String>) -> Self {
        Self {
            kind,
            dataset,
            message: message.into(),
        }
    }

    pub fn empty_result(message: impl Into<String>) -> Self {
        Self::new(WarningKind::EmptyResult, None, message)
    }

    pub fn malformed(dataset: Option<Uuid>, message: impl Into<String>) -> Self {
        Self::new(WarningKind::MalformedMetadata, dataset, message)
    }

    pub fn source_read(dataset: Uuid, message: impl Into<String>) -> Self {
        Self::new(WarningKind::SourceRead, Some(dataset), message)
    }

    pub fn missing_measurement(dataset: Uuid, message: impl Into<String>) -> Self {
        Self::new(WarningKind::MissingMeasurement, Some(dataset), message)
    }
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.dataset {
            Some(id) => write!(f, "{} [{}]: {}", self.kind.as_str(), id, self.message),
            None => write!(f, "{}: {}", self.kind.as_str(), self.message),
        }
    }
}

/// Fused pixels of one measurement for one tile, row-major (y, x).
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementArray {
    pub name: String,
    pub dtype: DataType,
    pub nodata: f32,
    pub data: Vec<f32>,
}

impl MeasurementArray {
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || value == self.nodata
    }

    /// Number of pixels holding valid data.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !self.is_nodata(**v)).count()
    }
}

/// The result for one `(time, tile)` element of a load.
#[derive(Debug, Clone)]
pub struct AssembledTile {
    pub key: TileKey,
    /// Pixel shape (height, width), padding included.
    pub shape: (usize, usize),
    pub crs: CrsCode,
    /// Extent of the tile's pixels in the output CRS.
    pub extent: BoundingBox,
    /// Extent of the tile's pixels in EPSG:4326, if it can be transformed.
    pub geographic_bounds: Option<BoundingBox>,
    /// GDAL-ordered affine transform of the tile.
    pub geotransform: [f64; 6],
    pub measurements: Vec<MeasurementArray>,
    /// Datasets whose data went into this tile, lowest priority first.
    pub datasets: Vec<Uuid>,
    pub warnings: Vec<LoadWarning>,
}

impl AssembledTile {
    /// Array of a measurement by name.
    pub fn get(&self, name: &str) -> Option<&MeasurementArray> {
        self.measurements.iter().find(|m| m.name == name)
    }

    /// All measurements stacked as a `(measurement, y, x)` array.
    pub fn stacked(&self) -> Vec<f32> {
        let (h, w) = self.shape;
        let mut out = Vec::with_capacity(self.measurements.len() * h * w);
        for m in &self.measurements {
            out.extend_from_slice(&m.data);
        }
        out
    }
}

/// Summary of a query, computed without reading pixels.
#[derive(Debug, Clone, Serialize)]
pub struct QueryDescriptor {
    pub product: String,
    pub crs: CrsCode,
    pub resolution: (f64, f64),
    pub time_grouping: TimeGrouping,
    pub measurements: Vec<String>,
    /// Output time coordinates, ascending.
    pub times: Vec<DateTime<Utc>>,
    pub tiles: Vec<TileIndex>,
    /// Pixel shape of every tile, padding included.
    pub tile_shape: (usize, usize),
    /// Shape `(time, y, x)` of the mosaic of all tiles, without padding.
    pub shape: (usize, usize, usize),
    /// Union of the tiles' extents in the output CRS.
    pub bounds: Option<BoundingBox>,
    pub dataset_count: usize,
    pub warnings: Vec<LoadWarning>,
}
