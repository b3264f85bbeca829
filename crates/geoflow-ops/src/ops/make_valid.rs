//! Make valid: best-effort ring cleanup and RFC 7946 winding order
//!
//! This is not a topology validator. Self-intersections and overlapping
//! parts are left as they are.

use geo::algorithm::orient::{Direction, Orient};
use geo_types::{Geometry, LineString, MultiLineString, MultiPolygon, Polygon};

use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::Result;
use crate::model::{ConfigMap, FeatureCollection};

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "make-valid",
        OperationCategory::Transform,
        "Make Valid",
        "Remove duplicate vertices and normalise polygon winding",
    )
    .with_input(PortSpec::required(ports::INPUT, "Input"))
}

pub fn apply(
    input: &FeatureCollection,
    _config: &ConfigMap,
    _secondary: Option<&FeatureCollection>,
) -> Result<FeatureCollection> {
    Ok(input
        .iter()
        .map(|f| f.map_geometry(repair(&f.geometry)))
        .collect())
}

fn repair(geometry: &Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::LineString(ls) => Geometry::LineString(dedup(ls, 2)),
        Geometry::MultiLineString(mls) => {
            Geometry::MultiLineString(MultiLineString::new(mls.iter().map(|ls| dedup(ls, 2)).collect()))
        }
        Geometry::Polygon(p) => Geometry::Polygon(repair_polygon(p)),
        Geometry::MultiPolygon(mp) => {
            Geometry::MultiPolygon(MultiPolygon::new(mp.iter().map(repair_polygon).collect()))
        }
        Geometry::Rect(r) => Geometry::Polygon(repair_polygon(&r.to_polygon())),
        Geometry::Triangle(t) => Geometry::Polygon(repair_polygon(&t.to_polygon())),
        Geometry::GeometryCollection(gc) => {
            Geometry::GeometryCollection(gc.iter().map(repair).collect())
        }
        other => other.clone(),
    }
}

fn repair_polygon(polygon: &Polygon<f64>) -> Polygon<f64> {
    Polygon::new(
        dedup(polygon.exterior(), 4),
        polygon.interiors().iter().map(|r| dedup(r, 4)).collect(),
    )
    .orient(Direction::Default)
}

/// Remove consecutive duplicate positions unless fewer than `min_len` remain
fn dedup(line: &LineString<f64>, min_len: usize) -> LineString<f64> {
    let mut coords = line.0.clone();
    coords.dedup();
    if coords.len() < min_len {
        line.clone()
    } else {
        LineString::new(coords)
    }
}

inventory::submit! {
    OperationEntry { descriptor, apply }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Feature;
    use geo::Winding;
    use geo_types::{line_string, polygon};

    #[test]
    fn test_make_valid_orients_exterior_counter_clockwise() {
        let clockwise = polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ];
        assert!(clockwise.exterior().is_cw());
        let input = FeatureCollection::new(vec![Feature::new(clockwise)]);
        let output = apply(&input, &ConfigMap::new(), None).unwrap();
        let Geometry::Polygon(fixed) = &output.features[0].geometry else {
            panic!("expected a polygon");
        };
        assert!(fixed.exterior().is_ccw());
    }

    #[test]
    fn test_make_valid_removes_repeated_positions() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 1.0, y: 1.0)];
        let input = FeatureCollection::new(vec![Feature::new(line)]);
        let output = apply(&input, &ConfigMap::new(), None).unwrap();
        let Geometry::LineString(fixed) = &output.features[0].geometry else {
            panic!("expected a line string");
        };
        assert_eq!(fixed.0.len(), 2);
    }

    #[test]
    fn test_make_valid_keeps_degenerate_line() {
        let point_line = line_string![(x: 3.0, y: 3.0), (x: 3.0, y: 3.0)];
        let input = FeatureCollection::new(vec![Feature::new(point_line)]);
        let output = apply(&input, &ConfigMap::new(), None).unwrap();
        assert_eq!(output, input);
    }
}
