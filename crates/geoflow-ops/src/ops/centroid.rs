//! Centroid: replace each geometry with its centre of mass

use geo::Centroid;

use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::Result;
use crate::model::{ConfigMap, FeatureCollection};

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "centroid",
        OperationCategory::Transform,
        "Centroid",
        "Replace each geometry with its centroid point",
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
        .filter_map(|feature| match feature.geometry.centroid() {
            Some(point) => Some(feature.map_geometry(point)),
            None => {
                log::debug!("centroid dropped an empty geometry");
                None
            }
        })
        .collect())
}

inventory::submit! {
    OperationEntry { descriptor, apply }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::{feature, square};
    use geo_types::{Geometry, MultiPoint};
    use serde_json::json;

    #[test]
    fn test_centroid_of_square_keeps_properties() {
        let input = FeatureCollection::new(vec![feature(square(0.0, 0.0, 2.0), json!({"name": "a"}))]);
        let output = apply(&input, &ConfigMap::new(), None).unwrap();
        let Geometry::Point(centre) = &output.features[0].geometry else {
            panic!("expected a point");
        };
        assert!((centre.x() - 1.0).abs() < 1e-12 && (centre.y() - 1.0).abs() < 1e-12);
        assert_eq!(output.features[0].properties["name"], "a");
    }

    #[test]
    fn test_centroid_drops_empty_geometry() {
        let empty: MultiPoint<f64> = MultiPoint::new(Vec::new());
        let input = FeatureCollection::new(vec![feature(empty, json!({}))]);
        assert!(apply(&input, &ConfigMap::new(), None).unwrap().is_empty());
    }
}
