//! Source window reader: one dataset, one measurement, one tile.

use std::sync::Arc;

use geo::{Contains, Coord};
use rayon::prelude::*;
use tracing::debug;

use cube_common::{BoundingBox, GridSpec, Measurement, ResamplingMethod, TileIndex};
use projection::{densify_ring, Transformer};

use crate::dataset::{ring_to_polygon, Dataset};
use crate::error::{GridProcessorError, Result};
use crate::resample::{sample, PixelFootprint, WindowView};
use crate::source::{PixelWindow, RasterSource};

/// One dataset's pixels resampled onto a tile's pixel grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceWindow {
    /// Tile-shaped values, row-major; `nodata` where the dataset has no data.
    pub data: Vec<f32>,
    pub nodata: f32,
    /// Tile pixel shape (height, width).
    pub shape: (usize, usize),
    /// Window of the dataset's raster that was read; `None` when nothing was.
    pub window: Option<PixelWindow>,
}

impl SourceWindow {
    fn empty(shape: (usize, usize), nodata: f32) -> Self {
        Self {
            data: vec![nodata; shape.0 * shape.1],
            nodata,
            shape,
            window: None,
        }
    }

    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || value == self.nodata
    }

    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !self.is_nodata(**v)).count()
    }
}

/// Reads and resamples dataset windows from a raster source.
pub struct SourceWindowReader {
    source: Arc<dyn RasterSource>,
    densify_points: usize,
}

impl SourceWindowReader {
    pub fn new(source: Arc<dyn RasterSource>, densify_points: usize) -> Self {
        Self {
            source,
            densify_points,
        }
    }

    /// Read the part of `dataset` under `tile` and resample it onto the tile's pixels.
    ///
    /// Only the window of the raster covering the tile (plus the kernel
    /// radius) is read. Target pixels outside the dataset's footprint are
    /// nodata. Values of integer measurements are rounded and clamped, never
    /// onto `nodata` itself.
    pub fn read_window(
        &self,
        dataset: &Dataset,
        measurement: &Measurement,
        tile: TileIndex,
        grid: &GridSpec,
    ) -> Result<SourceWindow> {
        let shape = grid.pixel_shape();
        let (h, w) = shape;
        let nodata = measurement.nodata;

        let locator = dataset.locator(measurement).ok_or_else(|| {
            GridProcessorError::MissingMeasurement {
                dataset: dataset.id.to_string(),
                measurement: measurement.name.clone(),
            }
        })?;

        let to_src = Transformer::new(grid.crs, dataset.crs);

        // Tile boundary in the dataset CRS, then in source pixel space.
        let tile_ring = densify_ring(&grid.padded_extent_of(tile).corners(), self.densify_points);
        let src_ring = to_src.transform_points(&tile_ring);
        let ring_pixels = src_ring
            .iter()
            .map(|&(x, y)| dataset.transform.world_to_pixel(x, y));
        let Some(bounds) = BoundingBox::from_points(ring_pixels) else {
            debug!(dataset = %dataset.id, tile = %tile, "Tile not expressible in dataset CRS");
            return Ok(SourceWindow::empty(shape, nodata));
        };

        let fully_inside = ring_to_polygon(&src_ring)
            .map(|p| dataset.footprint.contains(&p))
            .unwrap_or(false);

        // Source pixel position of every target pixel centre; NaN outside the footprint.
        let coords: Vec<(f64, f64)> = (0..h * w)
            .into_par_iter()
            .map(|i| {
                let (x, y) = grid.pixel_center(tile, i / w, i % w);
                let (sx, sy) = to_src.transform(x, y);
                if !sx.is_finite() || !sy.is_finite() {
                    return (f64::NAN, f64::NAN);
                }
                if !fully_inside && !dataset.footprint.contains(&Coord { x: sx, y: sy }) {
                    return (f64::NAN, f64::NAN);
                }
                dataset.transform.world_to_pixel(sx, sy)
            })
            .collect();

        if coords.iter().all(|(u, _)| u.is_nan()) {
            debug!(dataset = %dataset.id, tile = %tile, "No target pixel inside footprint");
            return Ok(SourceWindow::empty(shape, nodata));
        }

        let handle = self
            .source
            .open(locator)
            .map_err(|e| GridProcessorError::source_read(dataset.id, e))?;
        let (src_h, src_w) = handle.shape();
        if (src_h, src_w) != dataset.shape {
            debug!(
                dataset = %dataset.id,
                indexed = ?dataset.shape,
                actual = ?(src_h, src_w),
                "Raster shape differs from indexed shape"
            );
        }

        let radius = measurement.resampling.kernel_radius() as f64;
        let clip = |v: f64, max: usize| v.clamp(0.0, max as f64) as usize;
        let col0 = clip(bounds.min_x.floor() - radius, src_w);
        let col1 = clip(bounds.max_x.ceil() + radius, src_w);
        let row0 = clip(bounds.min_y.floor() - radius, src_h);
        let row1 = clip(bounds.max_y.ceil() + radius, src_h);
        if col1 <= col0 || row1 <= row0 {
            return Ok(SourceWindow::empty(shape, nodata));
        }

        let window = PixelWindow::new(row0, col0, row1 - row0, col1 - col0);
        let read = handle
            .read_window(window)
            .map_err(|e| GridProcessorError::source_read(dataset.id, e))?;
        drop(handle);
        debug!(dataset = %dataset.id, tile = %tile, window = ?window, "Read source window");

        let native_nodata = read.nodata;
        let values: Vec<f32> = read
            .values
            .into_iter()
            .map(|v| {
                let invalid = measurement.is_nodata(v) || native_nodata.is_some_and(|nd| v == nd);
                if invalid {
                    f32::NAN
                } else {
                    v
                }
            })
            .collect();
        let view = WindowView::new(&values, window.height, window.width);

        let corners = match measurement.resampling {
            ResamplingMethod::Mode | ResamplingMethod::Average => {
                Some(pixel_corners(grid, tile, &to_src, dataset))
            }
            _ => None,
        };

        let (off_u, off_v) = (col0 as f64, row0 as f64);
        let method = measurement.resampling;
        let dtype = measurement.dtype;
        let mut data = vec![nodata; h * w];
        data.par_chunks_mut(w).enumerate().for_each(|(row, out)| {
            for (col, px) in out.iter_mut().enumerate() {
                let (u, v) = coords[row * w + col];
                if u.is_nan() || v.is_nan() {
                    continue;
                }
                let footprint = corners
                    .as_ref()
                    .map(|c| c.footprint(row, col, off_u, off_v));
                let value = sample(method, &view, u - off_u, v - off_v, footprint.as_ref());
                if !value.is_nan() {
                    *px = dtype.cast_valid(value, nodata);
                }
            }
        });

        Ok(SourceWindow {
            data,
            nodata,
            shape,
            window: Some(window),
        })
    }
}

/// Source pixel positions of the corners of every target pixel.
struct CornerGrid {
    width: usize,
    points: Vec<(f64, f64)>,
}

impl CornerGrid {
    fn footprint(&self, row: usize, col: usize, off_u: f64, off_v: f64) -> PixelFootprint {
        let mut fp = PixelFootprint {
            min_u: f64::INFINITY,
            min_v: f64::INFINITY,
            max_u: f64::NEG_INFINITY,
            max_v: f64::NEG_INFINITY,
        };
        for (r, c) in [(row, col), (row, col + 1), (row + 1, col), (row + 1, col + 1)] {
            let (u, v) = self.points[r * self.width + c];
            fp.min_u = fp.min_u.min(u - off_u);
            fp.max_u = fp.max_u.max(u - off_u);
            fp.min_v = fp.min_v.min(v - off_v);
            fp.max_v = fp.max_v.max(v - off_v);
        }
        fp
    }
}

fn pixel_corners(grid: &GridSpec, tile: TileIndex, to_src: &Transformer, dataset: &Dataset) -> CornerGrid {
    let (h, w) = grid.pixel_shape();
    let [x0, rx, _, y0, _, ry] = grid.geotransform(tile);
    let width = w + 1;
    let points = (0..(h + 1) * width)
        .into_par_iter()
        .map(|i| {
            let (r, c) = (i / width, i % width);
            let (sx, sy) = to_src.transform(x0 + c as f64 * rx, y0 + r as f64 * ry);
            dataset.transform.world_to_pixel(sx, sy)
        })
        .collect();
    CornerGrid { width, points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::{CrsCode, DataType};
    use serde_json::json;
    use test_utils::ramp_values;
    use uuid::Uuid;

    use crate::dataset::SourceLocator;
    use crate::source::{MemoryRaster, MemoryRasterSource};

    fn dataset(footprint: Option<serde_json::Value>) -> Dataset {
        let mut doc = json!({
            "time": "2020-01-01T00:00:00Z",
            "crs": "EPSG:3577",
            "geotransform": [0.0, 25.0, 0.0, 1000.0, 0.0, -25.0],
            "shape": [40, 40],
            "measurements": {"red": {"path": "scene.zarr", "variable": "red"}}
        });
        if let Some(fp) = footprint {
            doc["footprint"] = fp;
        }
        Dataset::from_document(Uuid::new_v4(), "p", &doc).unwrap()
    }

    fn source_with_ramp() -> Arc<MemoryRasterSource> {
        let source = Arc::new(MemoryRasterSource::new());
        let raster = MemoryRaster::new(40, 40, ramp_values(40, 40), Some(-999.0)).unwrap();
        source
            .insert(SourceLocator::new("scene.zarr", Some("red")), raster)
            .unwrap();
        source
    }

    fn grid() -> GridSpec {
        GridSpec::new(CrsCode::Epsg3577, (25.0, -25.0), (1000.0, 1000.0)).unwrap()
    }

    fn red(dtype: DataType, method: ResamplingMethod) -> Measurement {
        Measurement::new("red", dtype, -999.0).with_resampling(method)
    }

    #[test]
    fn test_native_grid_reproduces_source() {
        let reader = SourceWindowReader::new(source_with_ramp(), 8);
        let out = reader
            .read_window(&dataset(None), &red(DataType::Float32, ResamplingMethod::Nearest), TileIndex::new(0, 0), &grid())
            .unwrap();

        assert_eq!(out.shape, (40, 40));
        assert_eq!(out.window, Some(PixelWindow::new(0, 0, 40, 40)));
        for r in 0..40 {
            for c in 0..40 {
                assert_eq!(out.data[r * 40 + c], (r * 40 + c) as f32);
            }
        }
    }

    #[test]
    fn test_pixels_outside_footprint_are_nodata() {
        let west_half = json!([[0.0, 0.0], [500.0, 0.0], [500.0, 1000.0], [0.0, 1000.0]]);
        let reader = SourceWindowReader::new(source_with_ramp(), 8);
        let out = reader
            .read_window(&dataset(Some(west_half)), &red(DataType::Float32, ResamplingMethod::Nearest), TileIndex::new(0, 0), &grid())
            .unwrap();

        assert_eq!(out.data[19], 19.0);
        assert_eq!(out.data[20], -999.0);
        assert_eq!(out.valid_count(), 40 * 20);
    }

    #[test]
    fn test_integer_measurements_are_rounded() {
        // Half a pixel east of the native grid: bilinear lands between columns.
        let shifted = grid().with_origin((12.5, 0.0)).unwrap();
        let reader = SourceWindowReader::new(source_with_ramp(), 8);
        let ds = dataset(None);

        let float = reader
            .read_window(&ds, &red(DataType::Float32, ResamplingMethod::Bilinear), TileIndex::new(0, 0), &shifted)
            .unwrap();
        assert!((float.data[0] - 0.5).abs() < 1e-4);

        let int = reader
            .read_window(&ds, &red(DataType::Int16, ResamplingMethod::Bilinear), TileIndex::new(0, 0), &shifted)
            .unwrap();
        assert_eq!(int.data[0], 1.0);
    }

    #[test]
    fn test_rounding_never_produces_nodata() {
        let source = Arc::new(MemoryRasterSource::new());
        let raster = MemoryRaster::from_fn(40, 40, Some(-5000.0), |_, c| if c % 2 == 0 { -1000.0 } else { -997.8 });
        source
            .insert(SourceLocator::new("scene.zarr", Some("red")), raster)
            .unwrap();
        let shifted = grid().with_origin((12.5, 0.0)).unwrap();
        let reader = SourceWindowReader::new(source, 8);

        let out = reader
            .read_window(&dataset(None), &red(DataType::Int16, ResamplingMethod::Bilinear), TileIndex::new(0, 0), &shifted)
            .unwrap();
        // -998.9 rounds onto the nodata value and is moved off it.
        for c in 0..39 {
            assert_eq!(out.data[c], -998.0, "column {}", c);
        }
    }

    #[test]
    fn test_source_nodata_is_not_interpolated() {
        let source = Arc::new(MemoryRasterSource::new());
        let raster = MemoryRaster::from_fn(40, 40, Some(-1.0), |_, c| if c == 1 { -1.0 } else { 10.0 });
        source
            .insert(SourceLocator::new("scene.zarr", Some("red")), raster)
            .unwrap();
        let shifted = grid().with_origin((12.5, 0.0)).unwrap();
        let reader = SourceWindowReader::new(source, 8);

        let out = reader
            .read_window(&dataset(None), &red(DataType::Float32, ResamplingMethod::Bilinear), TileIndex::new(0, 0), &shifted)
            .unwrap();
        // Target centre at source u = 1.0: neighbours are columns 0 and 1, and column 1
        // is nodata, so nearest (column 1) is used and the pixel stays nodata.
        assert_eq!(out.data[0], -999.0);
        assert_eq!(out.data[2], 10.0);
    }

    #[test]
    fn test_tile_away_from_dataset_reads_nothing() {
        // The source is empty: any I/O would fail.
        let reader = SourceWindowReader::new(Arc::new(MemoryRasterSource::new()), 8);
        let out = reader
            .read_window(&dataset(None), &red(DataType::Float32, ResamplingMethod::Nearest), TileIndex::new(5, 5), &grid())
            .unwrap();
        assert_eq!(out.window, None);
        assert_eq!(out.valid_count(), 0);
    }

    #[test]
    fn test_missing_raster_is_source_read_error() {
        let reader = SourceWindowReader::new(Arc::new(MemoryRasterSource::new()), 8);
        let err = reader
            .read_window(&dataset(None), &red(DataType::Float32, ResamplingMethod::Nearest), TileIndex::new(0, 0), &grid())
            .unwrap_err();
        assert!(matches!(err, GridProcessorError::SourceRead { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_missing_measurement() {
        let reader = SourceWindowReader::new(source_with_ramp(), 8);
        let blue = Measurement::new("blue", DataType::Float32, -999.0);
        let err = reader
            .read_window(&dataset(None), &blue, TileIndex::new(0, 0), &grid())
            .unwrap_err();
        assert!(matches!(err, GridProcessorError::MissingMeasurement { .. }));
    }

    #[test]
    fn test_average_downsamples() {
        let coarse = GridSpec::new(CrsCode::Epsg3577, (50.0, -50.0), (1000.0, 1000.0)).unwrap();
        let reader = SourceWindowReader::new(source_with_ramp(), 8);
        let out = reader
            .read_window(&dataset(None), &red(DataType::Float32, ResamplingMethod::Average), TileIndex::new(0, 0), &coarse)
            .unwrap();
        assert_eq!(out.shape, (20, 20));
        // Mean of rows 0-1, columns 0-1: (0 + 1 + 40 + 41) / 4.
        assert!((out.data[0] - 20.5).abs() < 1e-4);
    }
}
