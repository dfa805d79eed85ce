//! Raster sources: where dataset pixels are read from.
//!
//! Reads are synchronous; the loader runs them on the blocking pool.

pub mod memory;
pub mod zarr;

pub use memory::{MemoryRaster, MemoryRasterSource};
pub use zarr::ZarrRasterSource;

use crate::dataset::SourceLocator;
use crate::error::Result;

/// A rectangular block of pixels in a raster's own grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub row: usize,
    pub col: usize,
    pub height: usize,
    pub width: usize,
}

impl PixelWindow {
    pub fn new(row: usize, col: usize, height: usize, width: usize) -> Self {
        Self {
            row,
            col,
            height,
            width,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    pub fn len(&self) -> usize {
        self.height * self.width
    }

    /// Whether the window lies inside a raster of `shape` (height, width).
    pub fn fits(&self, shape: (usize, usize)) -> bool {
        self.row + self.height <= shape.0 && self.col + self.width <= shape.1
    }
}

/// Pixels of a window, row-major, with the raster's declared nodata value.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowData {
    pub window: PixelWindow,
    pub values: Vec<f32>,
    pub nodata: Option<f32>,
}

/// An open raster. Released when dropped.
pub trait RasterHandle: Send {
    /// Raster shape (height, width).
    fn shape(&self) -> (usize, usize);

    /// Read one window; it must fit inside the raster.
    fn read_window(&self, window: PixelWindow) -> Result<WindowData>;
}

/// Opens rasters named by dataset source locators.
pub trait RasterSource: Send + Sync {
    fn open(&self, locator: &SourceLocator) -> Result<Box<dyn RasterHandle>>;
}
