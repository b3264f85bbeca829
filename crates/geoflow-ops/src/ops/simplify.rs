//! Simplify: reduce vertex counts with Douglas-Peucker

use geo::Simplify;
use geo_types::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

use crate::config::{lenient, parse_config};
use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::{OperationError, Result};
use crate::model::{ConfigMap, FeatureCollection};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimplifyConfig {
    /// Tolerance in input coordinate units
    #[serde(deserialize_with = "lenient::f64")]
    pub tolerance: f64,
    /// Skip the radial-distance pre-pass
    #[serde(deserialize_with = "lenient::bool")]
    pub high_quality: bool,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.001,
            high_quality: false,
        }
    }
}

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "simplify",
        OperationCategory::Transform,
        "Simplify",
        "Reduce the number of vertices per geometry",
    )
    .with_input(PortSpec::required(ports::INPUT, "Input"))
    .with_defaults(&SimplifyConfig::default())
}

pub fn apply(
    input: &FeatureCollection,
    config: &ConfigMap,
    _secondary: Option<&FeatureCollection>,
) -> Result<FeatureCollection> {
    let config: SimplifyConfig = parse_config(config)?;
    if !config.tolerance.is_finite() || config.tolerance < 0.0 {
        return Err(OperationError::config(format!(
            "simplify tolerance must be non-negative, got {}",
            config.tolerance
        )));
    }
    let simplifier = Simplifier {
        tolerance: config.tolerance,
        high_quality: config.high_quality,
    };
    Ok(input
        .iter()
        .map(|f| f.map_geometry(simplifier.geometry(&f.geometry)))
        .collect())
}

struct Simplifier {
    tolerance: f64,
    high_quality: bool,
}

impl Simplifier {
    fn geometry(&self, geometry: &Geometry<f64>) -> Geometry<f64> {
        match geometry {
            Geometry::LineString(ls) => Geometry::LineString(self.line(ls, 2)),
            Geometry::MultiLineString(mls) => Geometry::MultiLineString(MultiLineString::new(
                mls.iter().map(|ls| self.line(ls, 2)).collect(),
            )),
            Geometry::Polygon(p) => Geometry::Polygon(self.polygon(p)),
            Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(MultiPolygon::new(
                mp.iter().map(|p| self.polygon(p)).collect(),
            )),
            Geometry::GeometryCollection(gc) => Geometry::GeometryCollection(
                gc.iter().map(|g| self.geometry(g)).collect(),
            ),
            other => other.clone(),
        }
    }

    fn polygon(&self, polygon: &Polygon<f64>) -> Polygon<f64> {
        Polygon::new(
            self.line(polygon.exterior(), 4),
            polygon.interiors().iter().map(|r| self.line(r, 4)).collect(),
        )
    }

    /// Simplify a path, keeping the original if fewer than `min_len` remain
    fn line(&self, line: &LineString<f64>, min_len: usize) -> LineString<f64> {
        let pre = if self.high_quality {
            line.clone()
        } else {
            radial_distance(line, self.tolerance)
        };
        let simplified = pre.simplify(&self.tolerance);
        if simplified.0.len() < min_len {
            line.clone()
        } else {
            simplified
        }
    }
}

/// Drop vertices closer than `tolerance` to the previously kept vertex
fn radial_distance(line: &LineString<f64>, tolerance: f64) -> LineString<f64> {
    let coords = &line.0;
    let (Some(first), Some(last)) = (coords.first(), coords.last()) else {
        return line.clone();
    };
    let sq_tolerance = tolerance * tolerance;
    let mut kept: Vec<Coord<f64>> = vec![*first];
    let mut previous = *first;
    for coord in &coords[1..coords.len().saturating_sub(1).max(1)] {
        let (dx, dy) = (coord.x - previous.x, coord.y - previous.y);
        if dx * dx + dy * dy > sq_tolerance {
            kept.push(*coord);
            previous = *coord;
        }
    }
    if coords.len() > 1 {
        kept.push(*last);
    }
    LineString::new(kept)
}

inventory::submit! {
    OperationEntry { descriptor, apply }
}
