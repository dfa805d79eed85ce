//! Tiled grid specifications.
//!
//! A [`GridSpec`] fixes the output CRS, the pixel size and the ground size of
//! a tile. Tiles are addressed by integer [`TileIndex`] values obtained by
//! flooring `(coordinate - origin) / tile_size` on each axis, so the tiling
//! covers the plane without gaps or overlaps.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::crs::CrsCode;
use crate::error::{CubeError, CubeResult};

/// Tolerance used when checking that a tile holds a whole number of pixels.
const PIXELS_PER_TILE_TOLERANCE: f64 = 1e-6;

/// Integer index of a tile in a [`GridSpec`].
///
/// `y` grows northward (with the CRS y axis), not with pixel rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileIndex {
    pub x: i64,
    pub y: i64,
}

impl TileIndex {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Specification of a tiled output grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Output coordinate reference system
    pub crs: CrsCode,
    /// Pixel size (x, y) in CRS units; y is normally negative (north-up)
    pub resolution: (f64, f64),
    /// Tile size (x, y) in CRS units, both positive
    pub tile_size: (f64, f64),
    /// Point at which tile (0, 0) has its lower-left corner
    #[serde(default)]
    pub origin: (f64, f64),
    /// Extra pixels added around every tile
    #[serde(default)]
    pub padding: u32,
}

impl GridSpec {
    /// Create and validate a grid with its origin at (0, 0).
    pub fn new(crs: CrsCode, resolution: (f64, f64), tile_size: (f64, f64)) -> CubeResult<Self> {
        let grid = Self {
            crs,
            resolution,
            tile_size,
            origin: (0.0, 0.0),
            padding: 0,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Same grid, anchored at a different origin.
    pub fn with_origin(mut self, origin: (f64, f64)) -> CubeResult<Self> {
        self.origin = origin;
        self.validate()?;
        Ok(self)
    }

    /// Same grid, with every tile grown by `padding` pixels on each side.
    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = padding;
        self
    }

    /// Validate the grid definition.
    pub fn validate(&self) -> CubeResult<()> {
        let (rx, ry) = self.resolution;
        if rx == 0.0 || ry == 0.0 || !rx.is_finite() || !ry.is_finite() {
            return Err(CubeError::InvalidGrid(format!(
                "resolution must be finite and non-zero, got ({}, {})",
                rx, ry
            )));
        }

        let (tx, ty) = self.tile_size;
        if !(tx > 0.0 && ty > 0.0 && tx.is_finite() && ty.is_finite()) {
            return Err(CubeError::InvalidGrid(format!(
                "tile size must be positive, got ({}, {})",
                tx, ty
            )));
        }

        if !self.origin.0.is_finite() || !self.origin.1.is_finite() {
            return Err(CubeError::InvalidGrid("origin must be finite".to_string()));
        }

        for (axis, tile, res) in [("x", tx, rx), ("y", ty, ry)] {
            let pixels = tile / res.abs();
            if pixels.round() < 1.0 || (pixels - pixels.round()).abs() > PIXELS_PER_TILE_TOLERANCE {
                return Err(CubeError::InvalidGrid(format!(
                    "tile size {} along {} is not a whole number of {} pixels",
                    tile,
                    axis,
                    res.abs()
                )));
            }
        }

        Ok(())
    }

    /// Tile containing the point `(x, y)`.
    pub fn cell_for(&self, x: f64, y: f64) -> TileIndex {
        TileIndex {
            x: ((x - self.origin.0) / self.tile_size.0).floor() as i64,
            y: ((y - self.origin.1) / self.tile_size.1).floor() as i64,
        }
    }

    /// Ground extent of a tile, without padding.
    pub fn extent_of(&self, tile: TileIndex) -> BoundingBox {
        let (tx, ty) = self.tile_size;
        let min_x = self.origin.0 + tile.x as f64 * tx;
        let min_y = self.origin.1 + tile.y as f64 * ty;
        BoundingBox::new(min_x, min_y, min_x + tx, min_y + ty)
    }

    /// Ground extent covered by a tile's pixels, padding included.
    pub fn padded_extent_of(&self, tile: TileIndex) -> BoundingBox {
        let extent = self.extent_of(tile);
        let pad_x = self.padding as f64 * self.resolution.0.abs();
        let pad_y = self.padding as f64 * self.resolution.1.abs();
        BoundingBox::new(
            extent.min_x - pad_x,
            extent.min_y - pad_y,
            extent.max_x + pad_x,
            extent.max_y + pad_y,
        )
    }

    /// Pixel shape of every tile as (height, width).
    pub fn pixel_shape(&self) -> (usize, usize) {
        let pad = 2 * self.padding as usize;
        let width = (self.tile_size.0 / self.resolution.0.abs()).round() as usize;
        let height = (self.tile_size.1 / self.resolution.1.abs()).round() as usize;
        (height + pad, width + pad)
    }

    /// All tiles needed to cover an extent.
    ///
    /// Edge tiles that are only partly inside the extent are included whole.
    /// The maximum edges of an extent with area are exclusive: a point lying
    /// exactly on `max_x` or `max_y` belongs (per [`GridSpec::cell_for`]) to a tile that
    /// is not returned, so callers needing that edge must grow the extent.
    pub fn tiles_for_extent(&self, extent: &BoundingBox) -> Vec<TileIndex> {
        let xs = grid_range(extent.min_x - self.origin.0, extent.max_x - self.origin.0, self.tile_size.0);
        let ys = grid_range(extent.min_y - self.origin.1, extent.max_y - self.origin.1, self.tile_size.1);

        let mut tiles = Vec::with_capacity(xs.clone().count() * ys.clone().count());
        for y in ys {
            for x in xs.clone() {
                tiles.push(TileIndex { x, y });
            }
        }
        tiles
    }

    /// Coordinates of the upper-left corner of pixel (0, 0) of a tile.
    fn pixel_origin(&self, tile: TileIndex) -> (f64, f64) {
        let extent = self.padded_extent_of(tile);
        let x0 = if self.resolution.0 > 0.0 {
            extent.min_x
        } else {
            extent.max_x
        };
        let y0 = if self.resolution.1 < 0.0 {
            extent.max_y
        } else {
            extent.min_y
        };
        (x0, y0)
    }

    /// Coordinates of the centre of pixel (row, col) within a tile.
    pub fn pixel_center(&self, tile: TileIndex, row: usize, col: usize) -> (f64, f64) {
        let (x0, y0) = self.pixel_origin(tile);
        (
            x0 + (col as f64 + 0.5) * self.resolution.0,
            y0 + (row as f64 + 0.5) * self.resolution.1,
        )
    }

    /// GDAL-ordered affine transform `[x0, dx, 0, y0, 0, dy]` of a tile.
    pub fn geotransform(&self, tile: TileIndex) -> [f64; 6] {
        let (x0, y0) = self.pixel_origin(tile);
        [x0, self.resolution.0, 0.0, y0, 0.0, self.resolution.1]
    }
}

/// Indices `floor(lower / step) .. ceil(upper / step)`, never empty.
fn grid_range(lower: f64, upper: f64, step: f64) -> Range<i64> {
    let start = (lower / step).floor() as i64;
    let end = ((upper / step).ceil() as i64).max(start + 1);
    start..end
}
