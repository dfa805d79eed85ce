//! Configuration for the loading engine.

use cube_common::TimeGrouping;
use serde::{Deserialize, Serialize};

use crate::types::DatasetOrdering;

/// Configuration for the loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Maximum number of tiles loaded concurrently by a stream.
    pub concurrency: usize,

    /// Time grouping used when a request does not name one.
    pub time_grouping: TimeGrouping,

    /// Points inserted along each edge when transforming extents and footprints.
    pub densify_points: usize,

    /// Dataset ordering used when a request does not name one.
    pub ordering: DatasetOrdering,

    /// Tile edge in pixels when neither the request nor the product gives a tile size.
    pub default_tile_pixels: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            time_grouping: TimeGrouping::Exact,
            densify_points: 20,
            ordering: DatasetOrdering::TimeAscending,
            default_tile_pixels: 256,
        }
    }
}

impl LoaderConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CUBE_LOAD_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                config.concurrency = n;
            }
        }

        if let Ok(val) = std::env::var("CUBE_TIME_GROUPING") {
            if let Ok(grouping) = TimeGrouping::parse(&val) {
                config.time_grouping = grouping;
            }
        }

        if let Ok(val) = std::env::var("CUBE_DENSIFY_POINTS") {
            if let Ok(n) = val.parse() {
                config.densify_points = n;
            }
        }

        if let Ok(val) = std::env::var("CUBE_DEFAULT_ORDERING") {
            if let Ok(ordering) = DatasetOrdering::parse(&val) {
                config.ordering = ordering;
            }
        }

        if let Ok(val) = std::env::var("CUBE_DEFAULT_TILE_PIXELS") {
            if let Ok(n) = val.parse() {
                config.default_tile_pixels = n;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.concurrency == 0 {
            return Err("concurrency must be > 0".to_string());
        }

        if self.default_tile_pixels == 0 {
            return Err("default_tile_pixels must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.time_grouping, TimeGrouping::Exact);
        assert_eq!(config.ordering, DatasetOrdering::TimeAscending);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoaderConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        config.concurrency = 2;
        config.default_tile_pixels = 0;
        assert!(config.validate().is_err());
    }
}
