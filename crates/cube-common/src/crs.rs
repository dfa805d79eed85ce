//! Coordinate Reference System codes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CubeError, CubeResult};

/// CRS codes understood by the loading engine.
///
/// Geographic codes are treated as sharing the WGS84 datum; the
/// sub-metre GDA94/WGS84 offset is below the pixel sizes served here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// GDA94 Geographic
    Epsg4283,
    /// Web Mercator (meters)
    Epsg3857,
    /// GDA94 / Australian Albers (meters)
    Epsg3577,
    /// WGS84 / UTM (EPSG:326zz north, EPSG:327zz south)
    Utm { zone: u8, south: bool },
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:3577"
    /// - "CRS:84" (equivalent to EPSG:4326)
    /// - "EPSG:32755" (UTM zone 55 south)
    pub fn parse(s: &str) -> CubeResult<Self> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "WGS84" => return Ok(CrsCode::Epsg4326),
            "EPSG:4283" => return Ok(CrsCode::Epsg4283),
            "EPSG:3857" | "EPSG:900913" => return Ok(CrsCode::Epsg3857),
            "EPSG:3577" => return Ok(CrsCode::Epsg3577),
            _ => {}
        }

        let code = normalized
            .strip_prefix("EPSG:")
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(|| CubeError::InvalidCrs(s.to_string()))?;

        Self::from_epsg(code).ok_or_else(|| CubeError::InvalidCrs(s.to_string()))
    }

    /// Look up a CRS from its numeric EPSG code.
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(CrsCode::Epsg4326),
            4283 => Some(CrsCode::Epsg4283),
            3857 => Some(CrsCode::Epsg3857),
            3577 => Some(CrsCode::Epsg3577),
            32601..=32660 => Some(CrsCode::Utm {
                zone: (code - 32600) as u8,
                south: false,
            }),
            32701..=32760 => Some(CrsCode::Utm {
                zone: (code - 32700) as u8,
                south: true,
            }),
            _ => None,
        }
    }

    /// Numeric EPSG code.
    pub fn epsg(&self) -> u32 {
        match self {
            CrsCode::Epsg4326 => 4326,
            CrsCode::Epsg4283 => 4283,
            CrsCode::Epsg3857 => 3857,
            CrsCode::Epsg3577 => 3577,
            CrsCode::Utm { zone, south: false } => 32600 + *zone as u32,
            CrsCode::Utm { zone, south: true } => 32700 + *zone as u32,
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326 | CrsCode::Epsg4283)
    }

    /// Units of the CRS axes.
    pub fn units(&self) -> &'static str {
        if self.is_geographic() {
            "degrees"
        } else {
            "metre"
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl TryFrom<String> for CrsCode {
    type Error = CubeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CrsCode::parse(&value)
    }
}

impl From<CrsCode> for String {
    fn from(code: CrsCode) -> Self {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(CrsCode::parse("EPSG:4326").unwrap(), CrsCode::Epsg4326);
        assert_eq!(CrsCode::parse("crs:84").unwrap(), CrsCode::Epsg4326);
        assert_eq!(CrsCode::parse("epsg:3577").unwrap(), CrsCode::Epsg3577);
        assert_eq!(
            CrsCode::parse("EPSG:32755").unwrap(),
            CrsCode::Utm {
                zone: 55,
                south: true
            }
        );
        assert_eq!(
            CrsCode::parse("EPSG:32633").unwrap(),
            CrsCode::Utm {
                zone: 33,
                south: false
            }
        );
    }

    #[test]
    fn test_unrecognised_crs_is_configuration_error() {
        for bad in ["EPSG:2193", "EPSG:32661", "EPSG:32700", "+proj=longlat", ""] {
            let err = CrsCode::parse(bad).unwrap_err();
            assert_eq!(err.kind(), "ConfigurationError", "{}", bad);
        }
    }

    #[test]
    fn test_display_round_trips() {
        for code in [
            CrsCode::Epsg4326,
            CrsCode::Epsg3577,
            CrsCode::Utm {
                zone: 56,
                south: true,
            },
        ] {
            assert_eq!(CrsCode::parse(&code.to_string()).unwrap(), code);
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&CrsCode::Epsg3577).unwrap();
        assert_eq!(json, "\"EPSG:3577\"");
        let back: CrsCode = serde_json::from_str("\"EPSG:32755\"").unwrap();
        assert_eq!(back.epsg(), 32755);
        assert!(serde_json::from_str::<CrsCode>("\"EPSG:9999\"").is_err());
    }
}
