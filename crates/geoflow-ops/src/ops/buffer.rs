//! Buffer: grow every geometry outward by a fixed distance

use geo::CoordsIter;
use geo_types::{Geometry, LineString, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::config::{lenient, parse_config, LengthUnit};
use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::{OperationError, Result};
use crate::geometry::{
    as_multi_polygon, circle, ensure_finite, from_multi_polygon, segment_band, union_all,
    LocalPlane,
};
use crate::model::{ConfigMap, FeatureCollection};

/// Vertices used to approximate each rounded corner
const CIRCLE_SEGMENTS: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BufferConfig {
    #[serde(deserialize_with = "lenient::f64")]
    pub distance: f64,
    pub units: LengthUnit,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            distance: 100.0,
            units: LengthUnit::Meters,
        }
    }
}

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "buffer",
        OperationCategory::Transform,
        "Buffer",
        "Expand every geometry by a distance",
    )
    .with_input(PortSpec::required(ports::INPUT, "Input"))
    .with_defaults(&BufferConfig::default())
}

pub fn apply(
    input: &FeatureCollection,
    config: &ConfigMap,
    _secondary: Option<&FeatureCollection>,
) -> Result<FeatureCollection> {
    let config: BufferConfig = parse_config(config)?;
    if !config.distance.is_finite() || config.distance <= 0.0 {
        return Err(OperationError::config(format!(
            "buffer distance must be positive, got {}",
            config.distance
        )));
    }
    let meters = config.units.to_meters(config.distance);

    let mut dropped = 0usize;
    let features: FeatureCollection = input
        .iter()
        .filter_map(|feature| match buffer_geometry(&feature.geometry, meters) {
            Ok(geometry) => Some(feature.map_geometry(geometry)),
            Err(e) => {
                dropped += 1;
                log::debug!("buffer dropped a feature: {e}");
                None
            }
        })
        .collect();

    if dropped > 0 {
        log::warn!("buffer dropped {dropped} of {} features", input.len());
    }
    Ok(features)
}

/// Buffer one lon/lat geometry by `meters`
pub fn buffer_geometry(geometry: &Geometry<f64>, meters: f64) -> Result<Geometry<f64>> {
    ensure_finite(geometry)?;
    let plane = LocalPlane::around(geometry)?;
    let projected = plane.project(geometry);

    let mut parts: Vec<MultiPolygon<f64>> = Vec::new();
    if let Some(interior) = as_multi_polygon(&projected) {
        parts.push(interior);
    }
    for path in linework(&projected) {
        for line in path.lines() {
            if let Some(band) = segment_band(line.start, line.end, meters) {
                parts.push(MultiPolygon::new(vec![band]));
            }
        }
    }
    for coord in projected.coords_iter() {
        parts.push(MultiPolygon::new(vec![circle(coord, meters, CIRCLE_SEGMENTS)]));
    }

    let merged = union_all(parts);
    if merged.0.is_empty() {
        return Err(OperationError::geometry("buffer produced an empty geometry"));
    }
    let result = plane.unproject(&merged);
    let geometry = from_multi_polygon(result);
    ensure_finite(&geometry)?;
    Ok(geometry)
}

/// Every ring and line string in a geometry
pub(crate) fn linework(geometry: &Geometry<f64>) -> Vec<LineString<f64>> {
    match geometry {
        Geometry::Point(_) | Geometry::MultiPoint(_) => Vec::new(),
        Geometry::Line(line) => vec![LineString::from(vec![line.start, line.end])],
        Geometry::LineString(ls) => vec![ls.clone()],
        Geometry::MultiLineString(mls) => mls.0.clone(),
        Geometry::Polygon(p) => std::iter::once(p.exterior().clone())
            .chain(p.interiors().iter().cloned())
            .collect(),
        Geometry::MultiPolygon(mp) => mp
            .iter()
            .flat_map(|p| linework(&Geometry::Polygon(p.clone())))
            .collect(),
        Geometry::Rect(r) => linework(&Geometry::Polygon(r.to_polygon())),
        Geometry::Triangle(t) => linework(&Geometry::Polygon(t.to_polygon())),
        Geometry::GeometryCollection(gc) => gc.iter().flat_map(linework).collect(),
    }
}

inventory::submit! {
    OperationEntry { descriptor, apply }
}
