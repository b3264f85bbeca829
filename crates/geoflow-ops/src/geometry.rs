//! Shared geometry helpers for the operation library

use geo::{BooleanOps, Centroid, CoordsIter, MapCoords};
use geo_types::{coord, Coord, Geometry, LineString, MultiPolygon, Point, Polygon};

use crate::error::{OperationError, Result};

/// Mean earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Meters spanned by one degree of latitude on the mean sphere
pub fn meters_per_degree() -> f64 {
    EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0
}

/// Great-circle distance between two lon/lat points, in meters
pub fn haversine_meters(a: Point<f64>, b: Point<f64>) -> f64 {
    let (lat1, lat2) = (a.y().to_radians(), b.y().to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.x() - a.x()).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

/// Reject geometries containing NaN or infinite coordinates
pub fn ensure_finite(geometry: &Geometry<f64>) -> Result<()> {
    if geometry
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
    {
        Ok(())
    } else {
        Err(OperationError::geometry("geometry has non-finite coordinates"))
    }
}

/// View a polygonal geometry as a MultiPolygon
///
/// Returns `None` for points and lines.
pub fn as_multi_polygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        _ => None,
    }
}

/// True for Polygon-like geometries
pub fn is_polygonal(geometry: &Geometry<f64>) -> bool {
    as_multi_polygon(geometry).is_some()
}

/// Collapse a single-member MultiPolygon to a Polygon
pub fn from_multi_polygon(mut multi: MultiPolygon<f64>) -> Geometry<f64> {
    if multi.0.len() == 1 {
        if let Some(polygon) = multi.0.pop() {
            return Geometry::Polygon(polygon);
        }
    }
    Geometry::MultiPolygon(multi)
}

/// Union a set of polygons by pairwise reduction
pub fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    parts.retain(|p| !p.0.is_empty());
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len() / 2 + 1);
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        parts = next;
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// Local equirectangular plane centred on a geometry, in meters
///
/// Accurate for features spanning a few hundred kilometers, which is the
/// range buffer distances are used at.
#[derive(Debug, Clone, Copy)]
pub struct LocalPlane {
    origin: Coord<f64>,
    kx: f64,
    ky: f64,
}

impl LocalPlane {
    pub fn around(geometry: &Geometry<f64>) -> Result<Self> {
        let origin = geometry
            .centroid()
            .map(|p| p.0)
            .or_else(|| geometry.coords_iter().next())
            .ok_or_else(|| OperationError::geometry("geometry is empty"))?;
        let ky = meters_per_degree();
        let kx = ky * origin.y.to_radians().cos();
        if kx.abs() < 1e-6 {
            return Err(OperationError::geometry(
                "geometry centre is too close to a pole",
            ));
        }
        Ok(Self { origin, kx, ky })
    }

    pub fn project(&self, geometry: &Geometry<f64>) -> Geometry<f64> {
        geometry.map_coords(|c| coord! {
            x: (c.x - self.origin.x) * self.kx,
            y: (c.y - self.origin.y) * self.ky,
        })
    }

    pub fn unproject(&self, multi: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        multi.map_coords(|c| coord! {
            x: c.x / self.kx + self.origin.x,
            y: c.y / self.ky + self.origin.y,
        })
    }
}

/// Regular polygon approximating a circle, counter-clockwise
pub fn circle(center: Coord<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let step = std::f64::consts::TAU / segments as f64;
    let ring: LineString<f64> = (0..segments)
        .map(|i| {
            let angle = step * i as f64;
            coord! { x: center.x + radius * angle.cos(), y: center.y + radius * angle.sin() }
        })
        .collect();
    Polygon::new(ring, Vec::new())
}

/// Rectangle of half-width `radius` around the segment `a`–`b`
///
/// Returns `None` for a zero-length segment.
pub fn segment_band(a: Coord<f64>, b: Coord<f64>, radius: f64) -> Option<Polygon<f64>> {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return None;
    }
    let (nx, ny) = (-dy / len * radius, dx / len * radius);
    let ring = LineString::from(vec![
        coord! { x: a.x + nx, y: a.y + ny },
        coord! { x: a.x - nx, y: a.y - ny },
        coord! { x: b.x - nx, y: b.y - ny },
        coord! { x: b.x + nx, y: b.y + ny },
    ]);
    Some(Polygon::new(ring, Vec::new()))
}
