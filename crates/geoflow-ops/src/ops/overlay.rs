//! Two-input operations: intersect, union and clip

use geo::{BooleanOps, Contains};
use geo_types::{Geometry, MultiLineString, MultiPoint, MultiPolygon};

use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::{OperationError, Result};
use crate::geometry::{as_multi_polygon, ensure_finite, from_multi_polygon};
use crate::model::{ConfigMap, Feature, FeatureCollection};
use crate::ops::buffer::linework;
use crate::ops::require_secondary;

pub mod intersect {
    use super::*;

    pub fn descriptor() -> OperationDescriptor {
        OperationDescriptor::new(
            "intersect",
            OperationCategory::Overlay,
            "Intersect",
            "Pairwise intersection of two polygon collections",
        )
        .with_input(PortSpec::required(ports::INPUT, "Input"))
        .with_input(PortSpec::required(ports::OVERLAY, "Overlay"))
    }

    /// Every non-empty intersection of a primary and a secondary polygon
    ///
    /// Properties merge primary first, so secondary keys win on collision.
    pub fn apply(
        input: &FeatureCollection,
        _config: &ConfigMap,
        secondary: Option<&FeatureCollection>,
    ) -> Result<FeatureCollection> {
        let overlay = require_secondary(secondary, ports::OVERLAY)?;
        let overlay_polygons: Vec<(&Feature, MultiPolygon<f64>)> = overlay
            .iter()
            .filter(|f| ensure_finite(&f.geometry).is_ok())
            .filter_map(|f| as_multi_polygon(&f.geometry).map(|mp| (f, mp)))
            .collect();

        let mut output = Vec::new();
        for feature in input.iter() {
            if ensure_finite(&feature.geometry).is_err() {
                continue;
            }
            let Some(a) = as_multi_polygon(&feature.geometry) else {
                continue;
            };
            for (other, b) in &overlay_polygons {
                let shared = a.intersection(b);
                if shared.0.is_empty() {
                    continue;
                }
                let mut properties = feature.properties.clone();
                properties.extend(other.properties.iter().map(|(k, v)| (k.clone(), v.clone())));
                output.push(Feature::with_properties(from_multi_polygon(shared), properties));
            }
        }
        Ok(FeatureCollection::new(output))
    }

    inventory::submit! {
        OperationEntry { descriptor, apply }
    }
}

pub mod union {
    use super::*;

    pub fn descriptor() -> OperationDescriptor {
        OperationDescriptor::new(
            "union",
            OperationCategory::Overlay,
            "Union",
            "Concatenate two collections without merging geometry",
        )
        .with_input(PortSpec::required(ports::INPUT, "Input"))
        .with_input(PortSpec::optional(ports::OTHER, "Other"))
    }

    pub fn apply(
        input: &FeatureCollection,
        _config: &ConfigMap,
        secondary: Option<&FeatureCollection>,
    ) -> Result<FeatureCollection> {
        Ok(input
            .iter()
            .chain(secondary.into_iter().flat_map(FeatureCollection::iter))
            .cloned()
            .collect())
    }

    inventory::submit! {
        OperationEntry { descriptor, apply }
    }
}

pub mod clip {
    use super::*;

    pub fn descriptor() -> OperationDescriptor {
        OperationDescriptor::new(
            "clip",
            OperationCategory::Overlay,
            "Clip",
            "Clip features to the first polygon of a mask collection",
        )
        .with_input(PortSpec::required(ports::INPUT, "Input"))
        .with_input(PortSpec::required(ports::MASK, "Mask"))
    }

    pub fn apply(
        input: &FeatureCollection,
        _config: &ConfigMap,
        secondary: Option<&FeatureCollection>,
    ) -> Result<FeatureCollection> {
        let mask_collection = require_secondary(secondary, ports::MASK)?;
        let first = mask_collection
            .features
            .first()
            .ok_or_else(|| OperationError::geometry("clip mask collection is empty"))?;
        if mask_collection.len() > 1 {
            log::debug!(
                "clip uses the first mask feature and ignores {} others",
                mask_collection.len() - 1
            );
        }
        ensure_finite(&first.geometry)?;
        let mask = as_multi_polygon(&first.geometry).ok_or_else(|| {
            OperationError::geometry(format!("clip mask must be a polygon, got {}", first.geometry_type()))
        })?;

        Ok(input
            .iter()
            .filter(|f| ensure_finite(&f.geometry).is_ok())
            .filter_map(|f| clip_geometry(&f.geometry, &mask).map(|g| f.map_geometry(g)))
            .collect())
    }

    fn clip_geometry(geometry: &Geometry<f64>, mask: &MultiPolygon<f64>) -> Option<Geometry<f64>> {
        match geometry {
            Geometry::Point(p) => mask.contains(p).then(|| Geometry::Point(*p)),
            Geometry::MultiPoint(mp) => {
                let inside: Vec<_> = mp.iter().filter(|p| mask.contains(*p)).copied().collect();
                (!inside.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(inside)))
            }
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                let lines = MultiLineString::new(linework(geometry));
                let clipped = mask.clip(&lines, false);
                match clipped.0.len() {
                    0 => None,
                    1 => clipped.0.into_iter().next().map(Geometry::LineString),
                    _ => Some(Geometry::MultiLineString(clipped)),
                }
            }
            Geometry::GeometryCollection(gc) => {
                let parts: Vec<_> = gc.iter().filter_map(|g| clip_geometry(g, mask)).collect();
                (!parts.is_empty()).then(|| Geometry::GeometryCollection(parts.into_iter().collect()))
            }
            polygonal => {
                let shared = as_multi_polygon(polygonal)?.intersection(mask);
                (!shared.0.is_empty()).then(|| from_multi_polygon(shared))
            }
        }
    }

    inventory::submit! {
        OperationEntry { descriptor, apply }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{feature, square};
    use geo::Area;
    use geo_types::{line_string, point};
    use serde_json::json;

    #[test]
    fn test_intersect_keeps_only_overlapping_pairs() {
        let primary = FeatureCollection::new(vec![
            feature(square(0.0, 0.0, 1.0), json!({"name": "A", "shared": "a"})),
            feature(square(10.0, 10.0, 2.0), json!({"name": "B", "shared": "b"})),
        ]);
        let secondary = FeatureCollection::new(vec![feature(
            square(11.0, 11.0, 2.0),
            json!({"shared": "c", "extra": 1}),
        )]);

        let output = intersect::apply(&primary, &ConfigMap::new(), Some(&secondary)).unwrap();

        assert_eq!(output.len(), 1);
        let props = &output.features[0].properties;
        assert_eq!(props["name"], "B");
        assert_eq!(props["shared"], "c");
        assert_eq!(props["extra"], 1);
        let Geometry::Polygon(overlap) = &output.features[0].geometry else {
            panic!("expected a polygon");
        };
        assert!((overlap.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_intersect_requires_overlay() {
        let primary = FeatureCollection::new(vec![feature(square(0.0, 0.0, 1.0), json!({}))]);
        assert!(matches!(
            intersect::apply(&primary, &ConfigMap::new(), None),
            Err(OperationError::MissingInput(_))
        ));
    }

    #[test]
    fn test_union_concatenates_in_order() {
        let a = FeatureCollection::new(vec![feature(point!(x: 0.0, y: 0.0), json!({"i": 0}))]);
        let b = FeatureCollection::new(vec![
            feature(point!(x: 0.0, y: 0.0), json!({"i": 1})),
            feature(point!(x: 1.0, y: 1.0), json!({"i": 2})),
        ]);
        let output = union::apply(&a, &ConfigMap::new(), Some(&b)).unwrap();
        let order: Vec<_> = output.iter().map(|f| f.properties["i"].clone()).collect();
        assert_eq!(order, vec![json!(0), json!(1), json!(2)]);

        assert_eq!(union::apply(&a, &ConfigMap::new(), None).unwrap(), a);
    }

    #[test]
    fn test_clip_uses_first_mask_feature_only() {
        let input = FeatureCollection::new(vec![
            feature(point!(x: 0.5, y: 0.5), json!({"kind": "inside"})),
            feature(point!(x: 5.5, y: 5.5), json!({"kind": "second-mask"})),
            feature(line_string![(x: -1.0, y: 0.5), (x: 2.0, y: 0.5)], json!({"kind": "line"})),
            feature(square(0.5, 0.5, 1.0), json!({"kind": "poly"})),
        ]);
        let mask = FeatureCollection::new(vec![
            feature(square(0.0, 0.0, 1.0), json!({})),
            feature(square(5.0, 5.0, 1.0), json!({})),
        ]);

        let output = clip::apply(&input, &ConfigMap::new(), Some(&mask)).unwrap();
        let kinds: Vec<_> = output.iter().map(|f| f.properties["kind"].clone()).collect();
        assert_eq!(kinds, vec![json!("inside"), json!("line"), json!("poly")]);
        assert_eq!(output.features[1].geometry_type(), "LineString");
        let Geometry::Polygon(quarter) = &output.features[2].geometry else {
            panic!("expected a polygon");
        };
        assert!((quarter.unsigned_area() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_clip_with_empty_mask_fails() {
        let input = FeatureCollection::new(vec![feature(point!(x: 0.0, y: 0.0), json!({}))]);
        let result = clip::apply(&input, &ConfigMap::new(), Some(&FeatureCollection::default()));
        assert!(matches!(result, Err(OperationError::Geometry(_))));
    }
}
