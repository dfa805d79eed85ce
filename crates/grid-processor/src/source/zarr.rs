//! Zarr V3 raster source on the local filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::dataset::SourceLocator;
use crate::error::{GridProcessorError, Result};

use super::{PixelWindow, RasterHandle, RasterSource, WindowData};

/// Opens 2-D Zarr arrays stored under a root directory.
///
/// A locator's `path` names the Zarr store relative to the root and its
/// `variable` names the array inside the store (the store root when absent).
/// Any integer or float element type is read and widened to `f32`. The
/// nodata value comes from a `nodata` attribute, else the fill value.
#[derive(Debug, Clone)]
pub struct ZarrRasterSource {
    root: PathBuf,
}

impl ZarrRasterSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RasterSource for ZarrRasterSource {
    fn open(&self, locator: &SourceLocator) -> Result<Box<dyn RasterHandle>> {
        let path = self.root.join(&locator.path);
        if !path.is_dir() {
            return Err(GridProcessorError::open_failed(format!(
                "no Zarr store at {}",
                path.display()
            )));
        }

        let store = FilesystemStore::new(&path)
            .map_err(|e| GridProcessorError::open_failed(e.to_string()))?;
        let array_path = match &locator.variable {
            Some(v) => format!("/{}", v.trim_start_matches('/')),
            None => "/".to_string(),
        };
        let array = Array::open(Arc::new(store), &array_path)
            .map_err(|e| GridProcessorError::open_failed(format!("{}: {}", locator, e)))?;

        if array.shape().len() != 2 {
            return Err(GridProcessorError::invalid_metadata(format!(
                "{} has {} dimensions, expected 2",
                locator,
                array.shape().len()
            )));
        }

        let nodata = array
            .attributes()
            .get("nodata")
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
            .or_else(|| fill_value_as_f32(array.data_type(), array.fill_value().as_ne_bytes()));

        debug!(locator = %locator, shape = ?array.shape(), "Opened Zarr raster");
        Ok(Box::new(ZarrRasterHandle { array, nodata }))
    }
}

struct ZarrRasterHandle {
    array: Array<FilesystemStore>,
    nodata: Option<f32>,
}

impl ZarrRasterHandle {
    fn retrieve<T>(&self, subset: &ArraySubset) -> Result<Vec<T>>
    where
        T: zarrs::array::ElementOwned,
    {
        self.array
            .retrieve_array_subset_elements::<T>(subset)
            .map_err(|e| GridProcessorError::read_failed(e.to_string()))
    }
}

impl RasterHandle for ZarrRasterHandle {
    fn shape(&self) -> (usize, usize) {
        let shape = self.array.shape();
        (shape[0] as usize, shape[1] as usize)
    }

    fn read_window(&self, window: PixelWindow) -> Result<WindowData> {
        if !window.fits(self.shape()) {
            return Err(GridProcessorError::read_failed(format!(
                "window {:?} outside raster of {:?}",
                window,
                self.shape()
            )));
        }

        // Zarr uses [row, col] indexing
        let subset = ArraySubset::new_with_start_shape(
            vec![window.row as u64, window.col as u64],
            vec![window.height as u64, window.width as u64],
        )
        .map_err(|e| GridProcessorError::read_failed(e.to_string()))?;

        let values: Vec<f32> = match self.array.data_type() {
            DataType::Float32 => self.retrieve::<f32>(&subset)?,
            DataType::Float64 => widen(self.retrieve::<f64>(&subset)?),
            DataType::Int8 => widen(self.retrieve::<i8>(&subset)?),
            DataType::Int16 => widen(self.retrieve::<i16>(&subset)?),
            DataType::Int32 => widen(self.retrieve::<i32>(&subset)?),
            DataType::Int64 => widen(self.retrieve::<i64>(&subset)?),
            DataType::UInt8 => widen(self.retrieve::<u8>(&subset)?),
            DataType::UInt16 => widen(self.retrieve::<u16>(&subset)?),
            DataType::UInt32 => widen(self.retrieve::<u32>(&subset)?),
            DataType::UInt64 => widen(self.retrieve::<u64>(&subset)?),
            other => {
                return Err(GridProcessorError::zarr_error(format!(
                    "unsupported data type {:?}",
                    other
                )))
            }
        };

        Ok(WindowData {
            window,
            values,
            nodata: self.nodata,
        })
    }
}

trait ToF32: Copy {
    fn to_f32(self) -> f32;
}

macro_rules! impl_to_f32 {
    ($($t:ty),*) => {
        $(impl ToF32 for $t {
            #[inline]
            fn to_f32(self) -> f32 {
                self as f32
            }
        })*
    };
}

impl_to_f32!(f64, i8, i16, i32, i64, u8, u16, u32, u64);

fn widen<T: ToF32>(values: Vec<T>) -> Vec<f32> {
    values.into_iter().map(ToF32::to_f32).collect()
}

/// Interpret a fill value's native-endian bytes for the array's element type.
fn fill_value_as_f32(data_type: &DataType, bytes: &[u8]) -> Option<f32> {
    macro_rules! decode {
        ($t:ty) => {
            bytes.try_into().ok().map(<$t>::from_ne_bytes).map(|v| v as f32)
        };
    }
    match data_type {
        DataType::Float32 => decode!(f32),
        DataType::Float64 => decode!(f64),
        DataType::Int8 => decode!(i8),
        DataType::Int16 => decode!(i16),
        DataType::Int32 => decode!(i32),
        DataType::Int64 => decode!(i64),
        DataType::UInt8 => decode!(u8),
        DataType::UInt16 => decode!(u16),
        DataType::UInt32 => decode!(u32),
        DataType::UInt64 => decode!(u64),
        _ => None,
    }
}
