//! Spatial index query: catalog records matching a product, time range and extent.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cube_common::{BoundingBox, CrsCode, TimeRange};
use projection::Transformer;
use storage::{Catalog, DatasetQuery};

use crate::dataset::{overlaps_interior, polygon_bbox, Dataset};
use crate::error::{GridProcessorError, Result};
use crate::types::LoadWarning;

/// Datasets matching a query plus the problems met while finding them.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub datasets: Vec<Dataset>,
    pub warnings: Vec<LoadWarning>,
    /// The query extent in the query CRS; the union of the matching
    /// footprints when the query named none.
    pub extent: Option<BoundingBox>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

/// Finds the indexed datasets that genuinely overlap a query.
pub struct SpatialIndexQuery {
    catalog: Arc<dyn Catalog>,
    densify_points: usize,
}

impl SpatialIndexQuery {
    pub fn new(catalog: Arc<dyn Catalog>, densify_points: usize) -> Self {
        Self {
            catalog,
            densify_points,
        }
    }

    /// Datasets of `product` overlapping `time_range` and `extent` (given in `crs`).
    ///
    /// Malformed records are skipped with a warning. An empty result is not
    /// an error. A catalog failure is `CatalogUnavailable` and is not retried.
    pub async fn find_datasets(
        &self,
        product: &str,
        time_range: Option<&TimeRange>,
        extent: Option<&BoundingBox>,
        crs: CrsCode,
    ) -> Result<QueryResult> {
        let geo_bbox = match extent {
            Some(e) => Some(
                Transformer::new(crs, CrsCode::Epsg4326)
                    .transform_bbox(e, self.densify_points)
                    .map_err(|err| {
                        GridProcessorError::configuration(format!(
                            "query extent cannot be expressed in EPSG:4326: {}",
                            err
                        ))
                    })?,
            ),
            None => None,
        };

        let query = DatasetQuery::new(product)
            .with_time_range(time_range.copied())
            .with_bbox(geo_bbox);
        let records = self.catalog.search(&query).await?;
        debug!(product = %product, candidates = records.len(), "Catalog returned candidates");

        let mut result = QueryResult::default();
        for record in &records {
            let dataset = match Dataset::from_record(record) {
                Ok(d) => d,
                Err(e) => {
                    warn!(dataset = %record.id, error = %e, "Skipping dataset with malformed metadata");
                    result
                        .warnings
                        .push(LoadWarning::malformed(Some(record.id), e.to_string()));
                    continue;
                }
            };

            if let Some(range) = time_range {
                if !range.overlaps(&dataset.time) {
                    continue;
                }
            }

            let footprint = match dataset.footprint_in(crs, self.densify_points) {
                Ok(f) => f,
                Err(e) => {
                    debug!(dataset = %dataset.id, error = %e, "Footprint outside query CRS domain");
                    continue;
                }
            };

            match extent {
                Some(e) if !overlaps_interior(&footprint, e) => continue,
                Some(_) => {}
                None => {
                    if let Some(fb) = polygon_bbox(&footprint) {
                        result.extent = Some(match result.extent {
                            Some(acc) => acc.union(&fb),
                            None => fb,
                        });
                    }
                }
            }

            result.datasets.push(dataset);
        }

        if extent.is_some() {
            result.extent = extent.copied();
        }

        if result.datasets.is_empty() {
            result.warnings.push(LoadWarning::empty_result(format!(
                "no datasets of '{}' match the query",
                product
            )));
        }

        info!(
            product = %product,
            matched = result.datasets.len(),
            skipped = result.warnings.len(),
            "Spatial index query complete"
        );
        Ok(result)
    }
}
