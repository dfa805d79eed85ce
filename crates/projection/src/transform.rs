//! CRS-to-CRS coordinate transforms.

use cube_common::{BoundingBox, CrsCode};

use crate::albers::AlbersEqualArea;
use crate::error::{ProjectionError, ProjectionResult};
use crate::mercator::WebMercator;
use crate::transverse_mercator::TransverseMercator;

/// A projection between a CRS and geographic lon/lat.
#[derive(Debug, Clone)]
pub enum Projection {
    Geographic,
    WebMercator(WebMercator),
    Albers(AlbersEqualArea),
    TransverseMercator(TransverseMercator),
}

impl Projection {
    pub fn for_crs(crs: CrsCode) -> Self {
        match crs {
            CrsCode::Epsg4326 | CrsCode::Epsg4283 => Projection::Geographic,
            CrsCode::Epsg3857 => Projection::WebMercator(WebMercator),
            CrsCode::Epsg3577 => Projection::Albers(AlbersEqualArea::australian_albers()),
            CrsCode::Utm { zone, south } => {
                Projection::TransverseMercator(TransverseMercator::utm(zone, south))
            }
        }
    }

    /// CRS coordinates to (lon, lat) in degrees.
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (x, y),
            Projection::WebMercator(p) => p.inverse(x, y),
            Projection::Albers(p) => p.inverse(x, y),
            Projection::TransverseMercator(p) => p.inverse(x, y),
        }
    }

    /// (lon, lat) in degrees to CRS coordinates.
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Projection::Geographic => (lon, lat),
            Projection::WebMercator(p) => p.forward(lon, lat),
            Projection::Albers(p) => p.forward(lon, lat),
            Projection::TransverseMercator(p) => p.forward(lon, lat),
        }
    }
}

/// Transforms coordinates from one CRS to another through lon/lat.
///
/// Transforming between identical CRS codes returns the input unchanged.
/// Points outside a projection's domain come back non-finite; callers are
/// expected to drop them.
#[derive(Debug, Clone)]
pub struct Transformer {
    src: CrsCode,
    dst: CrsCode,
    src_proj: Projection,
    dst_proj: Projection,
}

impl Transformer {
    pub fn new(src: CrsCode, dst: CrsCode) -> Self {
        Self {
            src,
            dst,
            src_proj: Projection::for_crs(src),
            dst_proj: Projection::for_crs(dst),
        }
    }

    pub fn source(&self) -> CrsCode {
        self.src
    }

    pub fn target(&self) -> CrsCode {
        self.dst
    }

    pub fn is_identity(&self) -> bool {
        self.src == self.dst || (self.src.is_geographic() && self.dst.is_geographic())
    }

    /// The transform in the opposite direction.
    pub fn inverse(&self) -> Transformer {
        Transformer::new(self.dst, self.src)
    }

    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        if self.is_identity() {
            return (x, y);
        }
        let (lon, lat) = self.src_proj.to_geographic(x, y);
        self.dst_proj.from_geographic(lon, lat)
    }

    pub fn transform_points(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        points.iter().map(|&(x, y)| self.transform(x, y)).collect()
    }

    /// Bounding box of a densified box outline after transformation.
    pub fn transform_bbox(
        &self,
        bbox: &BoundingBox,
        points_per_edge: usize,
    ) -> ProjectionResult<BoundingBox> {
        if self.is_identity() {
            return Ok(*bbox);
        }
        let ring = densify_ring(&bbox.corners(), points_per_edge);
        BoundingBox::from_points(self.transform_points(&ring))
            .ok_or_else(|| ProjectionError::OutOfDomain(self.dst.to_string()))
    }
}

/// Insert evenly spaced points along every edge of a ring.
///
/// The ring may be open or closed; the result is open (first point not repeated).
pub fn densify_ring(ring: &[(f64, f64)], points_per_edge: usize) -> Vec<(f64, f64)> {
    let mut vertices: Vec<(f64, f64)> = ring.to_vec();
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }
    if vertices.len() < 2 {
        return vertices;
    }

    let steps = points_per_edge + 1;
    let mut out = Vec::with_capacity(vertices.len() * steps);
    for (i, &(x0, y0)) in vertices.iter().enumerate() {
        let (x1, y1) = vertices[(i + 1) % vertices.len()];
        for s in 0..steps {
            let t = s as f64 / steps as f64;
            out.push((x0 + (x1 - x0) * t, y0 + (y1 - y0) * t));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_coords_approx_eq;

    #[test]
    fn test_identity_is_exact() {
        let t = Transformer::new(CrsCode::Epsg3577, CrsCode::Epsg3577);
        assert!(t.is_identity());
        assert_eq!(t.transform(1_500_012.5, -3_900_012.5), (1_500_012.5, -3_900_012.5));
    }

    #[test]
    fn test_albers_utm_round_trip() {
        let to_utm = Transformer::new(
            CrsCode::Epsg3577,
            CrsCode::Utm {
                zone: 55,
                south: true,
            },
        );
        let back = to_utm.inverse();
        let (e, n) = to_utm.transform(1_550_000.0, -3_950_000.0);
        let (x, y) = back.transform(e, n);
        assert_coords_approx_eq!((x, y), (1_550_000.0, -3_950_000.0), 1e-3);
    }

    #[test]
    fn test_densify_ring() {
        let ring = densify_ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)], 3);
        assert_eq!(ring.len(), 16);
        assert_eq!(ring[1], (1.0, 0.0));
        assert_eq!(ring[5], (4.0, 1.0));
    }

    #[test]
    fn test_transform_bbox_covers_curved_edges() {
        let t = Transformer::new(CrsCode::Epsg4326, CrsCode::Epsg3577);
        let geo = BoundingBox::new(140.0, -40.0, 150.0, -30.0);
        let coarse = t.transform_bbox(&geo, 0).unwrap();
        let fine = t.transform_bbox(&geo, 20).unwrap();
        // The southern edge bows outward between the corners.
        assert!(fine.min_y <= coarse.min_y);
        assert!(fine.width() >= coarse.width() - 1e-6);
    }
}
