//! Lazy array assembler: plans a load and produces per-(time, tile) arrays on demand.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use cube_common::{
    BoundingBox, CrsCode, GridSpec, Measurement, Product, TileIndex, TimeGrouping, TimeRange,
};
use projection::Transformer;
use storage::Catalog;

use crate::config::LoaderConfig;
use crate::error::{GridProcessorError, Result};
use crate::fusion::FusionAccumulator;
use crate::query::SpatialIndexQuery;
use crate::reader::SourceWindowReader;
use crate::resolver::{CellContributions, CellResolver};
use crate::source::RasterSource;
use crate::types::{
    AssembledTile, DatasetOrdering, LoadWarning, MeasurementArray, QueryDescriptor, TileKey,
};

/// Parameters of a load. Only the product is required.
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    pub product: String,
    pub time_range: Option<TimeRange>,
    pub extent: Option<BoundingBox>,
    /// CRS of `extent`; EPSG:4326 when absent.
    pub extent_crs: Option<CrsCode>,
    /// Measurement names or aliases; all of the product's when absent.
    pub measurements: Option<Vec<String>>,
    pub output_crs: Option<CrsCode>,
    pub resolution: Option<(f64, f64)>,
    pub tile_size: Option<(f64, f64)>,
    pub group_by: Option<TimeGrouping>,
    pub ordering: Option<DatasetOrdering>,
    pub tile_padding: Option<u32>,
}

impl LoadRequest {
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            ..Default::default()
        }
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn extent(mut self, extent: BoundingBox, crs: CrsCode) -> Self {
        self.extent = Some(extent);
        self.extent_crs = Some(crs);
        self
    }

    pub fn measurements<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.measurements = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn output_crs(mut self, crs: CrsCode) -> Self {
        self.output_crs = Some(crs);
        self
    }

    pub fn resolution(mut self, x: f64, y: f64) -> Self {
        self.resolution = Some((x, y));
        self
    }

    pub fn tile_size(mut self, x: f64, y: f64) -> Self {
        self.tile_size = Some((x, y));
        self
    }

    pub fn group_by(mut self, grouping: TimeGrouping) -> Self {
        self.group_by = Some(grouping);
        self
    }

    pub fn ordering(mut self, ordering: DatasetOrdering) -> Self {
        self.ordering = Some(ordering);
        self
    }

    pub fn tile_padding(mut self, padding: u32) -> Self {
        self.tile_padding = Some(padding);
        self
    }
}

/// Entry point of the query API.
pub struct Loader {
    catalog: Arc<dyn Catalog>,
    source: Arc<dyn RasterSource>,
    config: LoaderConfig,
}

impl Loader {
    pub fn new(catalog: Arc<dyn Catalog>, source: Arc<dyn RasterSource>, config: LoaderConfig) -> Self {
        Self {
            catalog,
            source,
            config,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.catalog.list_products().await?)
    }

    pub async fn list_measurements(&self, product: &str) -> Result<Vec<Measurement>> {
        Ok(self.catalog.get_product(product).await?.measurements)
    }

    /// Summarise a load without reading any pixels.
    pub async fn describe(&self, request: &LoadRequest) -> Result<QueryDescriptor> {
        let state = self.plan(request).await?;

        let times: Vec<_> = state
            .keys
            .iter()
            .map(|k| k.time)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let tiles: Vec<TileIndex> = state
            .keys
            .iter()
            .map(|k| k.tile)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let grid = &state.grid;
        let tile_shape = grid.pixel_shape();
        let pad = 2 * grid.padding as usize;
        let (inner_h, inner_w) = (tile_shape.0 - pad, tile_shape.1 - pad);

        let (shape, bounds) = match tile_span(&tiles) {
            Some((x0, x1, y0, y1)) => {
                let nx = (x1 - x0 + 1) as usize;
                let ny = (y1 - y0 + 1) as usize;
                let bounds = tiles
                    .iter()
                    .map(|t| grid.extent_of(*t))
                    .reduce(|a, b| a.union(&b));
                ((times.len(), ny * inner_h, nx * inner_w), bounds)
            }
            None => ((0, 0, 0), None),
        };

        let dataset_count = state
            .contributions
            .values()
            .flatten()
            .map(|d| d.id)
            .collect::<HashSet<Uuid>>()
            .len();

        Ok(QueryDescriptor {
            product: state.product.name.clone(),
            crs: grid.crs,
            resolution: grid.resolution,
            time_grouping: state.grouping,
            measurements: state.measurements.iter().map(|m| m.name.clone()).collect(),
            times,
            tiles,
            tile_shape,
            shape,
            bounds,
            dataset_count,
            warnings: state.warnings.clone(),
        })
    }

    /// Plan a load. No pixels are read until elements are requested.
    pub async fn load(&self, request: &LoadRequest) -> Result<LoadPlan> {
        let state = self.plan(request).await?;
        info!(
            product = %state.product.name,
            elements = state.keys.len(),
            measurements = state.measurements.len(),
            warnings = state.warnings.len(),
            "Load planned"
        );
        Ok(LoadPlan {
            state: Arc::new(state),
        })
    }

    async fn plan(&self, request: &LoadRequest) -> Result<PlanState> {
        let product = self.catalog.get_product(&request.product).await?;
        let measurements = product.select_measurements(request.measurements.as_deref())?;
        let grid = self.resolve_grid(&product, request)?;
        let grouping = request.group_by.unwrap_or(self.config.time_grouping);
        let ordering = request.ordering.unwrap_or(self.config.ordering);
        let densify = self.config.densify_points;

        let extent = match &request.extent {
            Some(e) => {
                let from = request.extent_crs.unwrap_or(CrsCode::Epsg4326);
                let projected = Transformer::new(from, grid.crs)
                    .transform_bbox(e, densify)
                    .map_err(|err| {
                        GridProcessorError::configuration(format!(
                            "extent cannot be expressed in {}: {}",
                            grid.crs, err
                        ))
                    })?;
                Some(projected)
            }
            None => None,
        };

        let query = SpatialIndexQuery::new(self.catalog.clone(), densify);
        let found = query
            .find_datasets(&product.name, request.time_range.as_ref(), extent.as_ref(), grid.crs)
            .await?;

        let contributions = match found.extent {
            Some(extent) if !found.datasets.is_empty() => CellResolver::new(densify).resolve(
                &found.datasets,
                &grid,
                &extent,
                grouping,
                ordering,
            ),
            _ => CellContributions::new(),
        };
        let keys: Vec<TileKey> = contributions.keys().copied().collect();

        Ok(PlanState {
            product,
            measurements,
            grid,
            grouping,
            contributions,
            keys,
            warnings: found.warnings,
            reader: SourceWindowReader::new(self.source.clone(), densify),
            default_concurrency: self.config.concurrency,
            densify_points: densify,
        })
    }

    /// Output grid from the request, falling back to the product's default grid.
    fn resolve_grid(&self, product: &Product, request: &LoadRequest) -> Result<GridSpec> {
        let base = product.grid.as_ref();
        let crs = request
            .output_crs
            .or(base.map(|g| g.crs))
            .ok_or_else(|| {
                GridProcessorError::configuration(format!(
                    "product '{}' has no default grid; output_crs is required",
                    product.name
                ))
            })?;
        let same_crs = base.filter(|g| g.crs == crs);

        let resolution = request
            .resolution
            .or(same_crs.map(|g| g.resolution))
            .ok_or_else(|| {
                GridProcessorError::configuration(format!(
                    "resolution is required for output CRS {}",
                    crs
                ))
            })?;

        let tile_size = request
            .tile_size
            .or(same_crs.filter(|g| g.resolution == resolution).map(|g| g.tile_size))
            .unwrap_or_else(|| {
                let n = self.config.default_tile_pixels as f64;
                (resolution.0.abs() * n, resolution.1.abs() * n)
            });

        let origin = same_crs.map(|g| g.origin).unwrap_or((0.0, 0.0));
        let padding = request
            .tile_padding
            .or(same_crs.map(|g| g.padding))
            .unwrap_or(0);

        Ok(GridSpec::new(crs, resolution, tile_size)?
            .with_origin(origin)?
            .with_padding(padding))
    }
}

/// Inclusive index range `(min_x, max_x, min_y, max_y)` of a set of tiles.
fn tile_span(tiles: &[TileIndex]) -> Option<(i64, i64, i64, i64)> {
    let first = tiles.first()?;
    Some(tiles.iter().fold(
        (first.x, first.x, first.y, first.y),
        |(x0, x1, y0, y1), t| (x0.min(t.x), x1.max(t.x), y0.min(t.y), y1.max(t.y)),
    ))
}

struct PlanState {
    product: Product,
    measurements: Vec<Measurement>,
    grid: GridSpec,
    grouping: TimeGrouping,
    contributions: CellContributions,
    keys: Vec<TileKey>,
    warnings: Vec<LoadWarning>,
    reader: SourceWindowReader,
    default_concurrency: usize,
    densify_points: usize,
}

impl PlanState {
    /// Read, resample and fuse every measurement of one element.
    ///
    /// A dataset contributes either all of its measurements to the element
    /// or, when any of its reads fails, none of them.
    fn assemble(&self, key: &TileKey) -> Result<AssembledTile> {
        let stack = self.contributions.get(key).ok_or_else(|| {
            GridProcessorError::configuration(format!("{} is not part of this load", key))
        })?;

        let grid = &self.grid;
        let shape = grid.pixel_shape();
        let len = shape.0 * shape.1;
        let mut warnings = Vec::new();
        let mut used: Vec<Uuid> = Vec::new();
        let mut accumulators: Vec<FusionAccumulator> = self
            .measurements
            .iter()
            .map(|m| FusionAccumulator::new(self.product.fusion, len, m.nodata))
            .collect();

        for dataset in stack {
            let mut windows = Vec::with_capacity(self.measurements.len());
            let mut failure = None;
            for measurement in &self.measurements {
                match self.reader.read_window(dataset, measurement, key.tile, grid) {
                    Ok(window) => windows.push(Some(window)),
                    Err(GridProcessorError::MissingMeasurement { .. }) => windows.push(None),
                    Err(e) if e.is_recoverable() => {
                        failure = Some(e);
                        break;
                    }
                    Err(e) => return Err(e),
                }
            }

            if let Some(e) = failure {
                warn!(dataset = %dataset.id, tile = %key.tile, error = %e, "Skipping unreadable dataset");
                warnings.push(LoadWarning::source_read(dataset.id, e.to_string()));
                continue;
            }

            let mut contributed = false;
            for ((measurement, acc), window) in self.measurements.iter().zip(&mut accumulators).zip(&windows) {
                match window {
                    Some(window) => {
                        acc.push(&window.data)?;
                        contributed |= window.window.is_some();
                    }
                    None => {
                        warn!(dataset = %dataset.id, measurement = %measurement.name, "Dataset lacks measurement");
                        warnings.push(LoadWarning::missing_measurement(
                            dataset.id,
                            format!("no source for measurement '{}'", measurement.name),
                        ));
                    }
                }
            }
            if contributed {
                used.push(dataset.id);
            }
        }

        let arrays: Vec<MeasurementArray> = self
            .measurements
            .iter()
            .zip(accumulators)
            .map(|(measurement, acc)| {
                let nodata = measurement.nodata;
                let dtype = measurement.dtype;
                let mut data = acc.finish();
                if dtype.is_integer() {
                    for v in data.iter_mut().filter(|v| !v.is_nan() && **v != nodata) {
                        *v = dtype.cast_valid(*v, nodata);
                    }
                }
                MeasurementArray {
                    name: measurement.name.clone(),
                    dtype,
                    nodata,
                    data,
                }
            })
            .collect();

        let extent = grid.padded_extent_of(key.tile);
        let geographic_bounds = Transformer::new(grid.crs, CrsCode::Epsg4326)
            .transform_bbox(&extent, self.densify_points)
            .ok();

        debug!(key = %key, datasets = used.len(), warnings = warnings.len(), "Assembled tile");
        Ok(AssembledTile {
            key: *key,
            shape,
            crs: grid.crs,
            extent,
            geographic_bounds,
            geotransform: grid.geotransform(key.tile),
            measurements: arrays,
            datasets: used,
            warnings,
        })
    }
}

/// A planned load: a finite list of `(time, tile)` keys computed on demand.
///
/// Cloning is cheap. Every call to [`LoadPlan::stream`] recomputes from the
/// sources; nothing is cached.
#[derive(Clone)]
pub struct LoadPlan {
    state: Arc<PlanState>,
}

impl LoadPlan {
    /// Element keys, ordered by time then tile.
    pub fn keys(&self) -> &[TileKey] {
        &self.state.keys
    }

    pub fn len(&self) -> usize {
        self.state.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.keys.is_empty()
    }

    /// Query-level warnings (malformed records, empty result).
    pub fn warnings(&self) -> &[LoadWarning] {
        &self.state.warnings
    }

    pub fn product(&self) -> &Product {
        &self.state.product
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.state.measurements
    }

    pub fn grid(&self) -> &GridSpec {
        &self.state.grid
    }

    /// Contributing dataset ids of one element, lowest priority first.
    pub fn contributors(&self, key: &TileKey) -> Vec<Uuid> {
        self.state
            .contributions
            .get(key)
            .map(|stack| stack.iter().map(|d| d.id).collect())
            .unwrap_or_default()
    }

    pub fn default_concurrency(&self) -> usize {
        self.state.default_concurrency
    }

    /// Compute one element.
    pub async fn load_tile(&self, key: &TileKey) -> Result<AssembledTile> {
        let state = self.state.clone();
        let key = *key;
        tokio::task::spawn_blocking(move || state.assemble(&key))
            .await
            .map_err(|e| GridProcessorError::Task(e.to_string()))?
    }

    /// All elements in key order, at most `concurrency` computed at a time.
    ///
    /// Dropping the stream stops dispatching further elements.
    pub fn stream(&self, concurrency: usize) -> BoxStream<'static, Result<AssembledTile>> {
        let plan = self.clone();
        stream::iter(self.state.keys.clone())
            .map(move |key| {
                let plan = plan.clone();
                async move { plan.load_tile(&key).await }
            })
            .buffered(concurrency.max(1))
            .boxed()
    }
}
