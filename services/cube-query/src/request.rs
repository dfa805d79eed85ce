//! Query arguments shared by the `describe` and `load` subcommands.

use anyhow::{bail, Result};
use clap::Args;

use cube_common::{BoundingBox, CrsCode, TimeGrouping, TimeRange};
use grid_processor::{DatasetOrdering, LoadRequest};

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Product name
    pub product: String,

    /// Time range "start/end" or a single timestamp
    #[arg(short, long)]
    pub time: Option<String>,

    /// Extent "minx,miny,maxx,maxy"
    #[arg(short, long, allow_hyphen_values = true)]
    pub extent: Option<String>,

    /// CRS of the extent
    #[arg(long, default_value = "EPSG:4326")]
    pub extent_crs: String,

    /// Comma-separated measurement names (default: all)
    #[arg(short, long, value_delimiter = ',')]
    pub measurements: Option<Vec<String>>,

    /// Output CRS (default: the product's grid)
    #[arg(long)]
    pub output_crs: Option<String>,

    /// Output resolution "x,y" in output CRS units
    #[arg(long, allow_hyphen_values = true)]
    pub resolution: Option<String>,

    /// Tile size "x,y" in output CRS units
    #[arg(long)]
    pub tile_size: Option<String>,

    /// Time grouping: exact, day or solar_day
    #[arg(long)]
    pub group_by: Option<String>,

    /// Dataset priority: time_ascending or time_descending
    #[arg(long)]
    pub ordering: Option<String>,

    /// Extra pixels around every tile
    #[arg(long)]
    pub padding: Option<u32>,
}

impl QueryArgs {
    pub fn to_request(&self) -> Result<LoadRequest> {
        let mut request = LoadRequest::new(&self.product);

        if let Some(time) = &self.time {
            request = request.time_range(TimeRange::parse(time)?);
        }
        if let Some(extent) = &self.extent {
            let crs = CrsCode::parse(&self.extent_crs)?;
            request = request.extent(BoundingBox::parse(extent)?, crs);
        }
        if let Some(names) = &self.measurements {
            request = request.measurements(names.iter().map(|n| n.trim().to_string()));
        }
        if let Some(crs) = &self.output_crs {
            request = request.output_crs(CrsCode::parse(crs)?);
        }
        if let Some(res) = &self.resolution {
            let (x, y) = parse_pair(res, "resolution")?;
            request = request.resolution(x, y);
        }
        if let Some(size) = &self.tile_size {
            let (x, y) = parse_pair(size, "tile size")?;
            request = request.tile_size(x, y);
        }
        if let Some(group_by) = &self.group_by {
            request = request.group_by(TimeGrouping::parse(group_by)?);
        }
        if let Some(ordering) = &self.ordering {
            request = request.ordering(DatasetOrdering::parse(ordering)?);
        }
        if let Some(padding) = self.padding {
            request = request.tile_padding(padding);
        }

        Ok(request)
    }
}

/// Parse "x,y"; a single value is used for both axes with y negated (north-up).
fn parse_pair(s: &str, what: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let numbers: Vec<f64> = parts
        .iter()
        .map(|p| p.parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| anyhow::anyhow!("invalid {} '{}'", what, s))?;
    match numbers.as_slice() {
        [x, y] => Ok((*x, *y)),
        [v] if what == "resolution" => Ok((*v, -*v)),
        [v] => Ok((*v, *v)),
        _ => bail!("invalid {} '{}', expected 'x,y'", what, s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(product: &str) -> QueryArgs {
        QueryArgs {
            product: product.to_string(),
            time: None,
            extent: None,
            extent_crs: "EPSG:4326".to_string(),
            measurements: None,
            output_crs: None,
            resolution: None,
            tile_size: None,
            group_by: None,
            ordering: None,
            padding: None,
        }
    }

    #[test]
    fn test_minimal_request() {
        let request = args("ls8").to_request().unwrap();
        assert_eq!(request.product, "ls8");
        assert!(request.extent.is_none());
        assert!(request.measurements.is_none());
    }

    #[test]
    fn test_full_request() {
        let mut a = args("ls8");
        a.time = Some("2016-01-01/2016-02-01".to_string());
        a.extent = Some("149.0,-35.5,149.3,-35.2".to_string());
        a.measurements = Some(vec!["red".to_string(), " nir".to_string()]);
        a.output_crs = Some("EPSG:32755".to_string());
        a.resolution = Some("30".to_string());
        a.group_by = Some("solar_day".to_string());
        a.ordering = Some("time_descending".to_string());
        a.padding = Some(1);

        let request = a.to_request().unwrap();
        assert_eq!(request.extent_crs, Some(CrsCode::Epsg4326));
        assert_eq!(request.measurements, Some(vec!["red".to_string(), "nir".to_string()]));
        assert_eq!(request.output_crs, Some(CrsCode::Utm { zone: 55, south: true }));
        assert_eq!(request.resolution, Some((30.0, -30.0)));
        assert_eq!(request.group_by, Some(TimeGrouping::SolarDay));
        assert_eq!(request.ordering, Some(DatasetOrdering::TimeDescending));
        assert_eq!(request.tile_padding, Some(1));
    }

    #[test]
    fn test_invalid_arguments() {
        let mut a = args("ls8");
        a.extent = Some("1,2,3".to_string());
        assert!(a.to_request().is_err());

        let mut a = args("ls8");
        a.resolution = Some("a,b".to_string());
        assert!(a.to_request().is_err());

        let mut a = args("ls8");
        a.group_by = Some("weekly".to_string());
        assert!(a.to_request().is_err());
    }

    #[test]
    fn test_parse_pair() {
        assert_eq!(parse_pair("25,-25", "resolution").unwrap(), (25.0, -25.0));
        assert_eq!(parse_pair("1000", "tile size").unwrap(), (1000.0, 1000.0));
        assert!(parse_pair("1,2,3", "tile size").is_err());
    }
}
