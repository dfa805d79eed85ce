//! Albers Equal-Area Conic projection (ellipsoidal form).
//!
//! Used by continental analysis-ready grids such as GDA94 / Australian
//! Albers (EPSG:3577). Formulas follow Snyder, "Map Projections: A Working
//! Manual", pp. 101-102.

use std::f64::consts::PI;

use crate::ellipsoid::Ellipsoid;

/// Albers Equal-Area Conic projection parameters.
#[derive(Debug, Clone)]
pub struct AlbersEqualArea {
    /// Central meridian in radians
    pub lon0: f64,
    /// Easting at the false origin (meters)
    pub false_easting: f64,
    /// Northing at the false origin (meters)
    pub false_northing: f64,
    pub ellipsoid: Ellipsoid,
    /// Cone constant (n)
    n: f64,
    /// Snyder's C
    c: f64,
    /// Rho at the latitude of origin
    rho0: f64,
}

impl AlbersEqualArea {
    /// Create a projection from standard parallels and origin (degrees).
    pub fn new(
        lat0_deg: f64,
        lon0_deg: f64,
        lat1_deg: f64,
        lat2_deg: f64,
        false_easting: f64,
        false_northing: f64,
        ellipsoid: Ellipsoid,
    ) -> Self {
        let to_rad = PI / 180.0;
        let lat0 = lat0_deg * to_rad;
        let lat1 = lat1_deg * to_rad;
        let lat2 = lat2_deg * to_rad;

        let e2 = ellipsoid.e2();
        let m1 = m(lat1, e2);
        let m2 = m(lat2, e2);
        let q0 = q(lat0, ellipsoid);
        let q1 = q(lat1, ellipsoid);
        let q2 = q(lat2, ellipsoid);

        let n = if (lat1 - lat2).abs() < 1e-10 {
            // Single standard parallel
            lat1.sin()
        } else {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        };
        let c = m1 * m1 + n * q1;
        let rho0 = ellipsoid.a * (c - n * q0).sqrt() / n;

        Self {
            lon0: lon0_deg * to_rad,
            false_easting,
            false_northing,
            ellipsoid,
            n,
            c,
            rho0,
        }
    }

    /// GDA94 / Australian Albers (EPSG:3577).
    pub fn australian_albers() -> Self {
        Self::new(0.0, 132.0, -18.0, -36.0, 0.0, 0.0, Ellipsoid::GRS80)
    }

    /// Project geographic coordinates (degrees) to easting/northing.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let to_rad = PI / 180.0;
        let lat = lat_deg * to_rad;

        let mut dlon = lon_deg * to_rad - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        let qv = q(lat, self.ellipsoid);
        let rho = self.ellipsoid.a * (self.c - self.n * qv).max(0.0).sqrt() / self.n;
        let theta = self.n * dlon;

        (
            self.false_easting + rho * theta.sin(),
            self.false_northing + self.rho0 - rho * theta.cos(),
        )
    }

    /// Unproject easting/northing to geographic coordinates (degrees).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let to_deg = 180.0 / PI;
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let e = self.ellipsoid.e();

        let x = x - self.false_easting;
        let dy = self.rho0 - (y - self.false_northing);

        // For a negative cone constant both rho and theta flip sign.
        let (rho, theta) = if self.n < 0.0 {
            (-(x * x + dy * dy).sqrt(), (-x).atan2(-dy))
        } else {
            ((x * x + dy * dy).sqrt(), x.atan2(dy))
        };

        let qv = (self.c - rho * rho * self.n * self.n / (a * a)) / self.n;

        // Iterate for latitude (Snyder eq. 3-16)
        let mut lat = (qv / 2.0).clamp(-1.0, 1.0).asin();
        for _ in 0..15 {
            let sin_lat = lat.sin();
            let cos_lat = lat.cos();
            if cos_lat.abs() < 1e-12 {
                break;
            }
            let one_minus = 1.0 - e2 * sin_lat * sin_lat;
            let delta = one_minus * one_minus / (2.0 * cos_lat)
                * (qv / (1.0 - e2) - sin_lat / one_minus
                    + 1.0 / (2.0 * e) * ((1.0 - e * sin_lat) / (1.0 + e * sin_lat)).ln());
            lat += delta;
            if delta.abs() < 1e-12 {
                break;
            }
        }

        let lon = self.lon0 + theta / self.n;
        (lon * to_deg, lat * to_deg)
    }
}

/// Snyder's m (eq. 14-15).
fn m(lat: f64, e2: f64) -> f64 {
    let sin_lat = lat.sin();
    lat.cos() / (1.0 - e2 * sin_lat * sin_lat).sqrt()
}

/// Snyder's q (eq. 3-12).
fn q(lat: f64, ellipsoid: Ellipsoid) -> f64 {
    let e2 = ellipsoid.e2();
    let e = ellipsoid.e();
    let sin_lat = lat.sin();
    (1.0 - e2)
        * (sin_lat / (1.0 - e2 * sin_lat * sin_lat)
            - 1.0 / (2.0 * e) * ((1.0 - e * sin_lat) / (1.0 + e * sin_lat)).ln())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, assert_coords_approx_eq};

    #[test]
    fn test_central_meridian_at_origin() {
        let proj = AlbersEqualArea::australian_albers();
        let (x, y) = proj.forward(132.0, 0.0);
        assert_approx_eq!(x, 0.0, 1e-6);
        assert_approx_eq!(y, 0.0, 1e-6);
    }

    #[test]
    fn test_round_trip() {
        let proj = AlbersEqualArea::australian_albers();
        for &(lon, lat) in &[
            (149.13, -35.28),
            (115.86, -31.95),
            (130.84, -12.46),
            (147.33, -42.88),
            (153.6, -28.6),
        ] {
            let (x, y) = proj.forward(lon, lat);
            let (lon2, lat2) = proj.inverse(x, y);
            assert_coords_approx_eq!((lon2, lat2), (lon, lat), 1e-9);
        }
    }

    #[test]
    fn test_canberra_position() {
        // Canberra lies roughly 1550 km east and 3950 km south of the origin.
        let proj = AlbersEqualArea::australian_albers();
        let (x, y) = proj.forward(149.13, -35.28);
        assert!(x > 1_500_000.0 && x < 1_600_000.0, "x = {}", x);
        assert!(y < -3_900_000.0 && y > -4_000_000.0, "y = {}", y);
    }

    #[test]
    fn test_west_of_meridian_is_negative() {
        let proj = AlbersEqualArea::australian_albers();
        let (x, _) = proj.forward(120.0, -25.0);
        assert!(x < 0.0);
    }
}
