//! Web Mercator (EPSG:3857), the spherical form on the WGS84 semi-major axis.

use std::f64::consts::PI;

/// Latitude limit that makes the projected world square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl WebMercator {
    const RADIUS: f64 = 6_378_137.0;

    /// Project geographic coordinates (degrees) to meters.
    ///
    /// Latitudes beyond ±85.05° are clamped.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = Self::RADIUS * lon_deg.to_radians();
        let y = Self::RADIUS * (PI / 4.0 + lat / 2.0).tan().ln();
        (x, y)
    }

    /// Unproject meters to geographic coordinates (degrees).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / Self::RADIUS).to_degrees();
        let lat = (2.0 * (y / Self::RADIUS).exp().atan() - PI / 2.0).to_degrees();
        (lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, assert_coords_approx_eq};

    #[test]
    fn test_world_extent() {
        let (x, y) = WebMercator.forward(180.0, MAX_LATITUDE);
        assert_approx_eq!(x, 20_037_508.342_789_244, 1e-6);
        assert_approx_eq!(y, 20_037_508.342_789_244, 1e-3);
    }

    #[test]
    fn test_round_trip() {
        for &(lon, lat) in &[(0.0, 0.0), (-122.4, 37.8), (151.2, -33.9)] {
            let (x, y) = WebMercator.forward(lon, lat);
            let (lon2, lat2) = WebMercator.inverse(x, y);
            assert_coords_approx_eq!((lon2, lat2), (lon, lat), 1e-9);
        }
    }
}
