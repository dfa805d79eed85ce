//! Cell resolver: which datasets contribute to which (time group, tile).

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use cube_common::{BoundingBox, GridSpec, TileIndex, TimeGrouping};

use crate::dataset::{overlaps_interior, polygon_bbox, Dataset};
use crate::types::{DatasetOrdering, TileKey};

/// Contributing datasets per cell, each list ordered lowest priority first.
pub type CellContributions = BTreeMap<TileKey, Vec<Dataset>>;

/// Maps datasets onto grid cells and time groups.
#[derive(Debug, Clone)]
pub struct CellResolver {
    densify_points: usize,
}

impl CellResolver {
    pub fn new(densify_points: usize) -> Self {
        Self { densify_points }
    }

    /// Bucket datasets by time group and tile.
    ///
    /// Only tiles of `extent` (in the grid CRS) whose pixel area genuinely
    /// overlaps a dataset's footprint receive it. Within a bucket datasets
    /// are sorted by acquisition time per `ordering`, ties broken by id.
    pub fn resolve(
        &self,
        datasets: &[Dataset],
        grid: &GridSpec,
        extent: &BoundingBox,
        grouping: TimeGrouping,
        ordering: DatasetOrdering,
    ) -> CellContributions {
        let query_tiles: HashSet<TileIndex> = grid.tiles_for_extent(extent).into_iter().collect();
        let mut cells = CellContributions::new();
        // Ground covered by the query's tiles, padding included.
        let Some(query_bounds) = query_tiles
            .iter()
            .map(|t| grid.padded_extent_of(*t))
            .reduce(|a, b| a.union(&b))
        else {
            return cells;
        };
        let pad_x = grid.padding as f64 * grid.resolution.0.abs();
        let pad_y = grid.padding as f64 * grid.resolution.1.abs();

        for dataset in datasets {
            let footprint = match dataset.footprint_in(grid.crs, self.densify_points) {
                Ok(f) => f,
                Err(e) => {
                    debug!(dataset = %dataset.id, error = %e, "Footprint not expressible in grid CRS");
                    continue;
                }
            };
            let Some(fb) = polygon_bbox(&footprint) else {
                continue;
            };
            // Padded tiles reach beyond their own extent, so widen the search,
            // then only enumerate tiles the query can use.
            let search = BoundingBox::new(fb.min_x - pad_x, fb.min_y - pad_y, fb.max_x + pad_x, fb.max_y + pad_y);
            let Some(search) = search.intersection(&query_bounds) else {
                continue;
            };

            let time = dataset.group_key(grouping);
            let mut assigned = 0usize;
            for tile in grid.tiles_for_extent(&search) {
                if !query_tiles.contains(&tile) {
                    continue;
                }
                if overlaps_interior(&footprint, &grid.padded_extent_of(tile)) {
                    cells
                        .entry(TileKey::new(time, tile))
                        .or_default()
                        .push(dataset.clone());
                    assigned += 1;
                }
            }
            debug!(dataset = %dataset.id, tiles = assigned, time = %time, "Resolved dataset cells");
        }

        for stack in cells.values_mut() {
            sort_stack(stack, ordering);
        }
        cells
    }
}

fn sort_stack(stack: &mut [Dataset], ordering: DatasetOrdering) {
    stack.sort_by(|a, b| {
        let by_time = a.time.center().cmp(&b.time.center());
        let by_time = match ordering {
            DatasetOrdering::TimeAscending => by_time,
            DatasetOrdering::TimeDescending => by_time.reverse(),
        };
        by_time.then_with(|| a.id.cmp(&b.id))
    });
}
