//! In-memory raster source.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::dataset::SourceLocator;
use crate::error::{GridProcessorError, Result};

use super::{PixelWindow, RasterHandle, RasterSource, WindowData};

/// A raster held in memory, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRaster {
    pub height: usize,
    pub width: usize,
    pub data: Vec<f32>,
    pub nodata: Option<f32>,
}

impl MemoryRaster {
    pub fn new(height: usize, width: usize, data: Vec<f32>, nodata: Option<f32>) -> Result<Self> {
        if data.len() != height * width {
            return Err(GridProcessorError::invalid_metadata(format!(
                "raster of {}x{} needs {} values, got {}",
                height,
                width,
                height * width,
                data.len()
            )));
        }
        Ok(Self {
            height,
            width,
            data,
            nodata,
        })
    }

    /// Raster with `f(row, col)` at every pixel.
    pub fn from_fn(height: usize, width: usize, nodata: Option<f32>, f: impl Fn(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(height * width);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col));
            }
        }
        Self {
            height,
            width,
            data,
            nodata,
        }
    }
}

/// Raster source backed by a map of locators to in-memory rasters.
#[derive(Debug, Default)]
pub struct MemoryRasterSource {
    rasters: RwLock<HashMap<SourceLocator, Arc<MemoryRaster>>>,
}

impl MemoryRasterSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, locator: SourceLocator, raster: MemoryRaster) -> Result<()> {
        let mut rasters = self
            .rasters
            .write()
            .map_err(|e| GridProcessorError::read_failed(e.to_string()))?;
        rasters.insert(locator, Arc::new(raster));
        Ok(())
    }

    /// Forget a raster, as if its file had been deleted.
    pub fn remove(&self, locator: &SourceLocator) -> Result<bool> {
        let mut rasters = self
            .rasters
            .write()
            .map_err(|e| GridProcessorError::read_failed(e.to_string()))?;
        Ok(rasters.remove(locator).is_some())
    }
}

impl RasterSource for MemoryRasterSource {
    fn open(&self, locator: &SourceLocator) -> Result<Box<dyn RasterHandle>> {
        let rasters = self
            .rasters
            .read()
            .map_err(|e| GridProcessorError::read_failed(e.to_string()))?;
        let raster = rasters
            .get(locator)
            .cloned()
            .ok_or_else(|| GridProcessorError::open_failed(format!("no raster at {}", locator)))?;
        Ok(Box::new(MemoryRasterHandle { raster }))
    }
}

struct MemoryRasterHandle {
    raster: Arc<MemoryRaster>,
}

impl RasterHandle for MemoryRasterHandle {
    fn shape(&self) -> (usize, usize) {
        (self.raster.height, self.raster.width)
    }

    fn read_window(&self, window: PixelWindow) -> Result<WindowData> {
        if !window.fits(self.shape()) {
            return Err(GridProcessorError::read_failed(format!(
                "window {:?} outside raster of {:?}",
                window,
                self.shape()
            )));
        }

        let mut values = Vec::with_capacity(window.len());
        for row in window.row..window.row + window.height {
            let start = row * self.raster.width + window.col;
            values.extend_from_slice(&self.raster.data[start..start + window.width]);
        }

        Ok(WindowData {
            window,
            values,
            nodata: self.raster.nodata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_window() {
        let source = MemoryRasterSource::new();
        let locator = SourceLocator::new("a", Some("red"));
        let raster = MemoryRaster::from_fn(4, 5, Some(-1.0), |r, c| (r * 10 + c) as f32);
        source.insert(locator.clone(), raster).unwrap();

        let handle = source.open(&locator).unwrap();
        assert_eq!(handle.shape(), (4, 5));
        let w = handle.read_window(PixelWindow::new(1, 2, 2, 3)).unwrap();
        assert_eq!(w.values, vec![12.0, 13.0, 14.0, 22.0, 23.0, 24.0]);
        assert_eq!(w.nodata, Some(-1.0));

        assert!(handle.read_window(PixelWindow::new(3, 0, 2, 1)).is_err());
    }

    #[test]
    fn test_missing_raster() {
        let source = MemoryRasterSource::new();
        let locator = SourceLocator::new("a", None);
        source
            .insert(locator.clone(), MemoryRaster::new(1, 1, vec![0.0], None).unwrap())
            .unwrap();
        assert!(source.remove(&locator).unwrap());
        assert!(source.open(&locator).is_err());
        assert!(MemoryRaster::new(2, 2, vec![0.0], None).is_err());
    }
}
