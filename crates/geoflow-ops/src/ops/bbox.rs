//! Bounding box: replace each geometry with its envelope polygon

use geo::BoundingRect;

use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::Result;
use crate::model::{ConfigMap, FeatureCollection};

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "bbox",
        OperationCategory::Transform,
        "Bounding Box",
        "Replace each geometry with its bounding rectangle",
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
        .filter_map(|feature| {
            feature
                .geometry
                .bounding_rect()
                .map(|rect| feature.map_geometry(rect.to_polygon()))
        })
        .collect())
}

inventory::submit! {
    OperationEntry { descriptor, apply }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::feature;
    use geo::Area;
    use geo_types::{line_string, Geometry};
    use serde_json::json;

    #[test]
    fn test_bbox_of_diagonal_line() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 2.0), (x: 3.0, y: 1.0)];
        let input = FeatureCollection::new(vec![feature(line, json!({"k": true}))]);
        let output = apply(&input, &ConfigMap::new(), None).unwrap();

        let Geometry::Polygon(rect) = &output.features[0].geometry else {
            panic!("expected a polygon");
        };
        assert_eq!(rect.unsigned_area(), 6.0);
        assert_eq!(output.features[0].properties["k"], true);
    }
}
