//! Dissolve: merge polygon features, optionally grouped by a property

use geo_types::MultiPolygon;
use serde::{Deserialize, Serialize};

use crate::config::{lenient, parse_config};
use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::Result;
use crate::geometry::{as_multi_polygon, ensure_finite, from_multi_polygon, union_all};
use crate::model::{ConfigMap, Feature, FeatureCollection, Properties};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DissolveConfig {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub property_name: Option<String>,
}

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "dissolve",
        OperationCategory::Transform,
        "Dissolve",
        "Merge polygons, optionally grouped by a property value",
    )
    .with_input(PortSpec::required(ports::INPUT, "Input"))
    .with_defaults(&DissolveConfig::default())
}

pub fn apply(
    input: &FeatureCollection,
    config: &ConfigMap,
    _secondary: Option<&FeatureCollection>,
) -> Result<FeatureCollection> {
    let config: DissolveConfig = parse_config(config)?;
    match config.property_name {
        Some(name) => Ok(dissolve_by(input, &name)),
        None => Ok(dissolve_all(input)),
    }
}

struct Group {
    key: String,
    properties: Properties,
    parts: Vec<MultiPolygon<f64>>,
}

/// One output feature per distinct value of `property`, in first-seen order
fn dissolve_by(input: &FeatureCollection, property: &str) -> FeatureCollection {
    let mut groups: Vec<Group> = Vec::new();
    for feature in input.iter() {
        let Some(polygons) = as_multi_polygon(&feature.geometry) else {
            continue;
        };
        let Some(value) = feature.properties.get(property) else {
            continue;
        };
        if ensure_finite(&feature.geometry).is_err() {
            log::warn!("dissolve skipped a feature with non-finite coordinates");
            continue;
        }
        let key = value.to_string();
        match groups.iter_mut().find(|g| g.key == key) {
            Some(group) => group.parts.push(polygons),
            None => groups.push(Group {
                key,
                properties: feature.properties.clone(),
                parts: vec![polygons],
            }),
        }
    }

    groups
        .into_iter()
        .map(|group| {
            Feature::with_properties(from_multi_polygon(union_all(group.parts)), group.properties)
        })
        .collect()
}

/// Union every polygon into one feature; other geometries follow unchanged
fn dissolve_all(input: &FeatureCollection) -> FeatureCollection {
    let (polygonal, others): (Vec<&Feature>, Vec<&Feature>) = input
        .iter()
        .partition(|f| as_multi_polygon(&f.geometry).is_some());

    let Some(first) = polygonal.first() else {
        return input.clone();
    };
    if polygonal.iter().any(|f| ensure_finite(&f.geometry).is_err()) {
        log::warn!("dissolve left features unmerged: non-finite coordinates");
        return input.clone();
    }

    let parts: Vec<_> = polygonal
        .iter()
        .filter_map(|f| as_multi_polygon(&f.geometry))
        .collect();
    let merged = union_all(parts);
    if merged.0.is_empty() {
        log::warn!("dissolve left features unmerged: union was empty");
        return input.clone();
    }

    std::iter::once(Feature::with_properties(from_multi_polygon(merged), first.properties.clone()))
        .chain(others.into_iter().cloned())
        .collect()
}

inventory::submit! {
    OperationEntry { descriptor, apply }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{config, feature, square};
    use geo::Area;
    use geo_types::{point, Geometry};
    use serde_json::json;

    fn sample() -> FeatureCollection {
        FeatureCollection::new(vec![
            feature(square(0.0, 0.0, 1.0), json!({"zone": "a", "n": 1})),
            feature(square(1.0, 0.0, 1.0), json!({"zone": "a", "n": 2})),
            feature(square(5.0, 5.0, 1.0), json!({"zone": "b", "n": 3})),
            feature(point!(x: 9.0, y: 9.0), json!({"zone": "a"})),
        ])
    }

    #[test]
    fn test_dissolve_by_property_groups_polygons() {
        let output = apply(&sample(), &config(json!({"propertyName": "zone"})), None).unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output.features[0].properties["zone"], "a");
        assert_eq!(output.features[0].properties["n"], 1);
        let Geometry::Polygon(merged) = &output.features[0].geometry else {
            panic!("adjacent squares should merge into one polygon");
        };
        assert!((merged.unsigned_area() - 2.0).abs() < 1e-9);
        assert_eq!(output.features[1].properties["zone"], "b");
    }

    #[test]
    fn test_dissolve_all_keeps_non_polygons_after_merge() {
        let output = apply(&sample(), &ConfigMap::new(), None).unwrap();

        assert_eq!(output.len(), 2);
        assert_eq!(output.features[0].geometry_type(), "MultiPolygon");
        assert_eq!(output.features[0].properties["n"], 1);
        assert_eq!(output.features[1].geometry_type(), "Point");
    }

    #[test]
    fn test_dissolve_all_abandons_union_on_bad_coordinates() {
        let input = FeatureCollection::new(vec![
            feature(square(0.0, 0.0, 1.0), json!({})),
            feature(square(f64::NAN, 0.0, 1.0), json!({})),
        ]);
        let output = apply(&input, &config(json!({"propertyName": ""})), None).unwrap();
        assert_eq!(output.len(), 2);
    }
}
