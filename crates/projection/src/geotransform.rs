//! Affine pixel <-> world transforms in GDAL coefficient order.

use nalgebra::{Matrix3, Vector3};

use crate::error::{ProjectionError, ProjectionResult};

/// Affine transform between pixel space (col, row) and CRS coordinates.
///
/// Coefficients follow GDAL: `[x0, dx, rx, y0, ry, dy]`, so that
/// `x = x0 + col * dx + row * rx` and `y = y0 + col * ry + row * dy`.
/// Pixel (0, 0) spans `[0, 1) x [0, 1)` in pixel space; its centre is (0.5, 0.5).
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTransform {
    forward: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> ProjectionResult<Self> {
        let forward = Matrix3::new(
            gt[1], gt[2], gt[0], //
            gt[4], gt[5], gt[3], //
            0.0, 0.0, 1.0,
        );
        let inverse = forward
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or(ProjectionError::NotInvertible(gt))?;
        Ok(Self { forward, inverse })
    }

    /// GDAL-ordered coefficients.
    pub fn to_gdal(&self) -> [f64; 6] {
        let m = &self.forward;
        [m[(0, 2)], m[(0, 0)], m[(0, 1)], m[(1, 2)], m[(1, 0)], m[(1, 1)]]
    }

    /// CRS coordinates of a (fractional) pixel position.
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let v = self.forward * Vector3::new(col, row, 1.0);
        (v.x, v.y)
    }

    /// Fractional pixel position of CRS coordinates.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let v = self.inverse * Vector3::new(x, y, 1.0);
        (v.x, v.y)
    }

    /// Outline of a `height x width` raster as an open ring of corners.
    pub fn outline(&self, height: usize, width: usize) -> Vec<(f64, f64)> {
        let (w, h) = (width as f64, height as f64);
        vec![
            self.pixel_to_world(0.0, 0.0),
            self.pixel_to_world(w, 0.0),
            self.pixel_to_world(w, h),
            self.pixel_to_world(0.0, h),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_coords_approx_eq;

    #[test]
    fn test_north_up_transform() {
        let gt = GeoTransform::from_gdal([1_500_000.0, 25.0, 0.0, -3_900_000.0, 0.0, -25.0]).unwrap();
        assert_eq!(gt.pixel_to_world(0.0, 0.0), (1_500_000.0, -3_900_000.0));
        assert_eq!(gt.pixel_to_world(4.0, 2.0), (1_500_100.0, -3_900_050.0));

        let (col, row) = gt.world_to_pixel(1_500_112.5, -3_900_062.5);
        assert_coords_approx_eq!((col, row), (4.5, 2.5), 1e-9);
    }

    #[test]
    fn test_rotated_transform_round_trip() {
        let gt = GeoTransform::from_gdal([100.0, 2.0, 0.5, 200.0, 0.3, -2.0]).unwrap();
        let (x, y) = gt.pixel_to_world(10.25, 7.75);
        let (col, row) = gt.world_to_pixel(x, y);
        assert_coords_approx_eq!((col, row), (10.25, 7.75), 1e-9);
        assert_eq!(gt.to_gdal(), [100.0, 2.0, 0.5, 200.0, 0.3, -2.0]);
    }

    #[test]
    fn test_degenerate_transform_rejected() {
        assert!(GeoTransform::from_gdal([0.0, 0.0, 0.0, 0.0, 0.0, -1.0]).is_err());
        assert!(GeoTransform::from_gdal([0.0, 1.0, 2.0, 0.0, 0.5, 1.0]).is_err());
    }
}
