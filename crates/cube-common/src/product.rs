//! Product definitions: measurements, sample types, resampling and fusion.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CubeError, CubeResult};
use crate::grid::GridSpec;

/// Sample type a measurement is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    UInt8,
    UInt16,
    UInt32,
    Float32,
    Float64,
}

impl DataType {
    pub fn is_integer(&self) -> bool {
        !matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Inclusive value range of integer types.
    pub fn range(&self) -> Option<(f64, f64)> {
        match self {
            DataType::Int8 => Some((i8::MIN as f64, i8::MAX as f64)),
            DataType::Int16 => Some((i16::MIN as f64, i16::MAX as f64)),
            DataType::Int32 => Some((i32::MIN as f64, i32::MAX as f64)),
            DataType::UInt8 => Some((0.0, u8::MAX as f64)),
            DataType::UInt16 => Some((0.0, u16::MAX as f64)),
            DataType::UInt32 => Some((0.0, u32::MAX as f64)),
            DataType::Float32 | DataType::Float64 => None,
        }
    }

    /// Round and clamp a resampled value into this type's range.
    #[inline]
    pub fn cast(&self, value: f32) -> f32 {
        match self.range() {
            Some((lo, hi)) => (value as f64).round().clamp(lo, hi) as f32,
            None => value,
        }
    }

    /// [`DataType::cast`] for a valid sample that must stay distinguishable from `nodata`.
    ///
    /// A value that rounds or clamps onto `nodata` moves one step back toward
    /// where it came from, or away from the range limit it was clamped to.
    pub fn cast_valid(&self, value: f32, nodata: f32) -> f32 {
        let cast = self.cast(value);
        if cast != nodata || !self.is_integer() {
            return cast;
        }
        let step = if value >= nodata { 1.0 } else { -1.0 };
        let nudged = self.cast(cast + step);
        if nudged != nodata {
            nudged
        } else {
            self.cast(cast - step)
        }
    }

    /// Whether `value` can be stored without change.
    pub fn can_represent(&self, value: f32) -> bool {
        match self.range() {
            Some((lo, hi)) => {
                value.is_finite() && value.fract() == 0.0 && (value as f64) >= lo && (value as f64) <= hi
            }
            None => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resampling method used when warping a source onto a tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingMethod {
    /// Value of the source pixel containing the target pixel centre.
    #[default]
    Nearest,
    /// Four-neighbour interpolation.
    Bilinear,
    /// Sixteen-neighbour Catmull-Rom interpolation.
    #[serde(alias = "bicubic")]
    Cubic,
    /// Most common valid value under the target pixel.
    Mode,
    /// Mean of the valid values under the target pixel.
    #[serde(alias = "mean")]
    Average,
}

impl ResamplingMethod {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> CubeResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "cubic" | "bicubic" => Ok(Self::Cubic),
            "mode" => Ok(Self::Mode),
            "average" | "mean" => Ok(Self::Average),
            _ => Err(CubeError::configuration(format!(
                "unknown resampling method '{}'",
                s
            ))),
        }
    }

    /// Extra source pixels needed around a window for this kernel.
    pub fn kernel_radius(&self) -> usize {
        match self {
            Self::Cubic => 2,
            _ => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Cubic => "cubic",
            Self::Mode => "mode",
            Self::Average => "average",
        }
    }
}

impl fmt::Display for ResamplingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How overlapping datasets are combined into one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionPolicy {
    /// Later (higher priority) valid values replace earlier ones.
    #[default]
    Overwrite,
    /// Mean of the valid values.
    Mean,
    /// Smallest valid value.
    Min,
    /// Largest valid value.
    Max,
}

impl FusionPolicy {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> CubeResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            _ => Err(CubeError::configuration(format!(
                "unknown fusion policy '{}'",
                s
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overwrite => "overwrite",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for FusionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One band of a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub dtype: DataType,
    #[serde(with = "nodata_value")]
    pub nodata: f32,
    #[serde(default)]
    pub units: String,
    #[serde(default, alias = "resampling_method")]
    pub resampling: ResamplingMethod,
    /// Variable name inside the source files, when it differs from `name`.
    #[serde(default, alias = "varname")]
    pub src_varname: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Measurement {
    pub fn new(name: impl Into<String>, dtype: DataType, nodata: f32) -> Self {
        Self {
            name: name.into(),
            dtype,
            nodata,
            units: String::new(),
            resampling: ResamplingMethod::default(),
            src_varname: None,
            aliases: Vec::new(),
        }
    }

    pub fn with_resampling(mut self, resampling: ResamplingMethod) -> Self {
        self.resampling = resampling;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    /// Whether `name` refers to this measurement.
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    /// Names a dataset may use for this measurement, in lookup order.
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.src_varname.as_deref())
            .chain(self.aliases.iter().map(String::as_str))
    }

    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || value == self.nodata
    }
}

/// On-disk chunking of a product's ingested storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageLayout {
    #[serde(default)]
    pub chunking: BTreeMap<String, usize>,
    #[serde(default = "default_dimension_order")]
    pub dimension_order: Vec<String>,
}

fn default_dimension_order() -> Vec<String> {
    vec!["time".to_string(), "y".to_string(), "x".to_string()]
}

impl StorageLayout {
    pub fn validate(&self) -> CubeResult<()> {
        let mut sorted = self.dimension_order.clone();
        sorted.sort();
        if sorted != ["time", "x", "y"] {
            return Err(CubeError::configuration(format!(
                "dimension_order must name time, y and x once each, got {:?}",
                self.dimension_order
            )));
        }

        for (dim, size) in &self.chunking {
            if !self.dimension_order.contains(dim) {
                return Err(CubeError::configuration(format!(
                    "chunking names unknown dimension '{}'",
                    dim
                )));
            }
            if *size == 0 {
                return Err(CubeError::configuration(format!(
                    "chunk size for '{}' must be > 0",
                    dim
                )));
            }
        }

        Ok(())
    }
}

/// A named collection of measurements sharing a grid and fusion policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub measurements: Vec<Measurement>,
    #[serde(default)]
    pub fusion: FusionPolicy,
    /// Default output grid for loads of this product.
    #[serde(default)]
    pub grid: Option<GridSpec>,
    #[serde(default)]
    pub storage: Option<StorageLayout>,
}

impl Product {
    /// Validate measurement names, nodata values, grid and storage layout.
    pub fn validate(&self) -> CubeResult<()> {
        if self.name.trim().is_empty() {
            return Err(CubeError::configuration("product name must not be empty"));
        }
        if self.measurements.is_empty() {
            return Err(CubeError::configuration(format!(
                "product '{}' declares no measurements",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for m in &self.measurements {
            for name in std::iter::once(&m.name).chain(&m.aliases) {
                if !seen.insert(name.as_str()) {
                    return Err(CubeError::configuration(format!(
                        "product '{}' uses measurement name '{}' twice",
                        self.name, name
                    )));
                }
            }
            if !m.dtype.can_represent(m.nodata) {
                return Err(CubeError::configuration(format!(
                    "nodata {} of measurement '{}' does not fit {}",
                    m.nodata, m.name, m.dtype
                )));
            }
        }

        if let Some(grid) = &self.grid {
            grid.validate()?;
        }
        if let Some(storage) = &self.storage {
            storage.validate()?;
        }

        Ok(())
    }

    /// Find a measurement by name or alias.
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.measurements.iter().find(|m| m.matches(name))
    }

    /// Resolve requested measurement names; `None` selects all of them.
    pub fn select_measurements(&self, names: Option<&[String]>) -> CubeResult<Vec<Measurement>> {
        match names {
            None => Ok(self.measurements.clone()),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.measurement(name)
                        .cloned()
                        .ok_or_else(|| CubeError::UnknownMeasurement {
                            product: self.name.clone(),
                            measurement: name.clone(),
                        })
                })
                .collect(),
        }
    }
}

/// Serde for nodata values that may be NaN (JSON has no NaN literal).
mod nodata_value {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("nan")
        } else {
            serializer.serialize_f32(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n as f32),
            Raw::Text(s) => match s.trim().to_lowercase().as_str() {
                "nan" | ".nan" => Ok(f32::NAN),
                other => other
                    .parse::<f32>()
                    .map_err(|_| serde::de::Error::custom(format!("invalid nodata value '{}'", s))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> Product {
        Product {
            name: "ls8_nbar".to_string(),
            description: String::new(),
            measurements: vec![
                Measurement::new("red", DataType::Int16, -999.0),
                Measurement {
                    aliases: vec!["band_5".to_string()],
                    ..Measurement::new("nir", DataType::Int16, -999.0)
                },
                Measurement::new("cloud", DataType::UInt8, 0.0)
                    .with_resampling(ResamplingMethod::Mode),
            ],
            fusion: FusionPolicy::Overwrite,
            grid: None,
            storage: None,
        }
    }

    #[test]
    fn test_cast_integer_types() {
        assert_eq!(DataType::Int16.cast(12.6), 13.0);
        assert_eq!(DataType::Int16.cast(-40_000.0), -32768.0);
        assert_eq!(DataType::UInt8.cast(-3.0), 0.0);
        assert_eq!(DataType::UInt8.cast(300.2), 255.0);
        assert_eq!(DataType::Float32.cast(12.6), 12.6);
    }

    #[test]
    fn test_cast_valid_avoids_nodata() {
        assert_eq!(DataType::Int16.cast_valid(-998.6, -999.0), -998.0);
        assert_eq!(DataType::Int16.cast_valid(-999.4, -999.0), -1000.0);
        assert_eq!(DataType::Int16.cast_valid(12.6, -999.0), 13.0);
        // Clamped onto a nodata at the range limit.
        assert_eq!(DataType::Int16.cast_valid(-40_000.0, -32768.0), -32767.0);
        assert_eq!(DataType::UInt8.cast_valid(0.2, 0.0), 1.0);
        assert_eq!(DataType::Float32.cast_valid(-999.0, -999.0), -999.0);
    }

    #[test]
    fn test_can_represent() {
        assert!(DataType::Int16.can_represent(-999.0));
        assert!(!DataType::Int16.can_represent(f32::NAN));
        assert!(!DataType::UInt8.can_represent(-1.0));
        assert!(!DataType::Int8.can_represent(0.5));
        assert!(DataType::Float32.can_represent(f32::NAN));
    }

    #[test]
    fn test_select_measurements() {
        let p = product();
        assert_eq!(p.select_measurements(None).unwrap().len(), 3);

        let picked = p
            .select_measurements(Some(&["band_5".to_string(), "red".to_string()]))
            .unwrap();
        assert_eq!(picked[0].name, "nir");
        assert_eq!(picked[1].name, "red");

        let err = p
            .select_measurements(Some(&["swir".to_string()]))
            .unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn test_validate_rejects_bad_products() {
        assert!(product().validate().is_ok());

        let mut dup = product();
        dup.measurements[2].aliases.push("red".to_string());
        assert!(dup.validate().is_err());

        let mut bad_nodata = product();
        bad_nodata.measurements[2].nodata = -1.0;
        assert!(bad_nodata.validate().is_err());

        let mut empty = product();
        empty.measurements.clear();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_nan_nodata_survives_json() {
        let m = Measurement::new("sst", DataType::Float32, f32::NAN);
        let json = serde_json::to_string(&m).unwrap();
        let back: Measurement = serde_json::from_str(&json).unwrap();
        assert!(back.nodata.is_nan());
        assert!(back.is_nodata(f32::NAN));
    }

    #[test]
    fn test_resampling_parse() {
        assert_eq!(
            ResamplingMethod::parse("BICUBIC").unwrap(),
            ResamplingMethod::Cubic
        );
        assert_eq!(
            ResamplingMethod::parse("mean").unwrap(),
            ResamplingMethod::Average
        );
        assert!(ResamplingMethod::parse("lanczos").is_err());
        assert_eq!(ResamplingMethod::Cubic.kernel_radius(), 2);
    }

    #[test]
    fn test_storage_layout_validation() {
        let layout = StorageLayout {
            chunking: [("x".to_string(), 200), ("y".to_string(), 200)]
                .into_iter()
                .collect(),
            dimension_order: default_dimension_order(),
        };
        assert!(layout.validate().is_ok());

        let bad = StorageLayout {
            chunking: BTreeMap::new(),
            dimension_order: vec!["y".to_string(), "x".to_string()],
        };
        assert!(bad.validate().is_err());
    }
}
