//! Smooth: Chaikin corner cutting for lines and polygons

use geo::ChaikinSmoothing;
use geo_types::Geometry;
use serde::{Deserialize, Serialize};

use crate::config::{lenient, parse_config};
use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::{OperationError, Result};
use crate::geometry::ensure_finite;
use crate::model::{ConfigMap, FeatureCollection};

pub const MAX_ITERATIONS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothConfig {
    #[serde(deserialize_with = "lenient::usize")]
    pub iterations: usize,
}

impl Default for SmoothConfig {
    fn default() -> Self {
        Self { iterations: 3 }
    }
}

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "smooth",
        OperationCategory::Transform,
        "Smooth",
        "Round the corners of lines and polygons",
    )
    .with_input(PortSpec::required(ports::INPUT, "Input"))
    .with_defaults(&SmoothConfig::default())
}

pub fn apply(
    input: &FeatureCollection,
    config: &ConfigMap,
    _secondary: Option<&FeatureCollection>,
) -> Result<FeatureCollection> {
    let config: SmoothConfig = parse_config(config)?;
    if config.iterations > MAX_ITERATIONS {
        return Err(OperationError::config(format!(
            "smooth iterations must be at most {MAX_ITERATIONS}, got {}",
            config.iterations
        )));
    }
    if config.iterations == 0 {
        return Ok(input.clone());
    }
    Ok(input
        .iter()
        .map(|f| match smooth_geometry(&f.geometry, config.iterations) {
            Some(geometry) => f.map_geometry(geometry),
            None => f.clone(),
        })
        .collect())
}

/// `None` when the geometry cannot be smoothed and should pass through
fn smooth_geometry(geometry: &Geometry<f64>, iterations: usize) -> Option<Geometry<f64>> {
    ensure_finite(geometry).ok()?;
    match geometry {
        Geometry::LineString(ls) if ls.0.len() >= 3 => {
            Some(Geometry::LineString(ls.chaikin_smoothing(iterations)))
        }
        Geometry::MultiLineString(mls) if mls.iter().all(|ls| ls.0.len() >= 3) => {
            Some(Geometry::MultiLineString(mls.chaikin_smoothing(iterations)))
        }
        Geometry::Polygon(p) if p.exterior().0.len() >= 4 => {
            Some(Geometry::Polygon(p.chaikin_smoothing(iterations)))
        }
        Geometry::MultiPolygon(mp) if mp.iter().all(|p| p.exterior().0.len() >= 4) => {
            Some(Geometry::MultiPolygon(mp.chaikin_smoothing(iterations)))
        }
        _ => None,
    }
}

inventory::submit! {
    OperationEntry { descriptor, apply }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Feature;
    use crate::ops::test_support::{config, square};
    use geo_types::{line_string, point};
    use serde_json::json;

    #[test]
    fn test_smooth_adds_vertices_to_polygon() {
        let input = FeatureCollection::new(vec![Feature::new(square(0.0, 0.0, 1.0))]);
        let output = apply(&input, &config(json!({"iterations": 2})), None).unwrap();
        let Geometry::Polygon(smoothed) = &output.features[0].geometry else {
            panic!("expected a polygon");
        };
        assert!(smoothed.exterior().0.len() > 5);
        assert!(smoothed.exterior().is_closed());
    }

    #[test]
    fn test_smooth_passes_points_and_short_lines_through() {
        let input = FeatureCollection::new(vec![
            Feature::new(point!(x: 1.0, y: 1.0)),
            Feature::new(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)]),
        ]);
        assert_eq!(apply(&input, &ConfigMap::new(), None).unwrap(), input);
    }

    #[test]
    fn test_smooth_rejects_too_many_iterations() {
        let input = FeatureCollection::default();
        assert!(matches!(
            apply(&input, &config(json!({"iterations": "11"})), None),
            Err(OperationError::InvalidConfig(_))
        ));
    }
}
