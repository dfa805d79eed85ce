//! Transverse Mercator projection (Krüger series to third order in n).
//!
//! Accurate to well under a millimetre within a UTM zone, which is all the
//! loading engine needs for scene footprints and pixel windows.

use crate::ellipsoid::Ellipsoid;

#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Central meridian in radians
    pub lon0: f64,
    pub scale: f64,
    pub false_easting: f64,
    pub false_northing: f64,
    /// Rectifying radius times scale
    k0a: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
    n: f64,
}

impl TransverseMercator {
    pub fn new(
        lon0_deg: f64,
        scale: f64,
        false_easting: f64,
        false_northing: f64,
        ellipsoid: Ellipsoid,
    ) -> Self {
        let n = ellipsoid.f / (2.0 - ellipsoid.f);
        let n2 = n * n;
        let n3 = n2 * n;
        let rectifying = ellipsoid.a / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);

        Self {
            lon0: lon0_deg.to_radians(),
            scale,
            false_easting,
            false_northing,
            k0a: scale * rectifying,
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
            n,
        }
    }

    /// WGS84 / UTM zone `zone` (1-60), northern or southern hemisphere.
    pub fn utm(zone: u8, south: bool) -> Self {
        let lon0 = zone as f64 * 6.0 - 183.0;
        let false_northing = if south { 10_000_000.0 } else { 0.0 };
        Self::new(lon0, 0.9996, 500_000.0, false_northing, Ellipsoid::WGS84)
    }

    /// Project geographic coordinates (degrees) to easting/northing.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let dlon = lon_deg.to_radians() - self.lon0;

        let c = 2.0 * self.n.sqrt() / (1.0 + self.n);
        let t = (lat.sin().atanh() - c * (c * lat.sin()).atanh()).sinh();
        let xi = t.atan2(dlon.cos());
        let eta = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut e = eta;
        let mut n = xi;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            e += alpha * (k * xi).cos() * (k * eta).sinh();
            n += alpha * (k * xi).sin() * (k * eta).cosh();
        }

        (
            self.false_easting + self.k0a * e,
            self.false_northing + self.k0a * n,
        )
    }

    /// Unproject easting/northing to geographic coordinates (degrees).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let xi = (y - self.false_northing) / self.k0a;
        let eta = (x - self.false_easting) / self.k0a;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_p -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut lat = chi;
        for (j, delta) in self.delta.iter().enumerate() {
            lat += delta * (2.0 * (j + 1) as f64 * chi).sin();
        }
        let lon = self.lon0 + eta_p.sinh().atan2(xi_p.cos());

        (lon.to_degrees(), lat.to_degrees())
    }
}
