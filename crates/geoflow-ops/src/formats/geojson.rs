//! GeoJSON reading and writing via the `geojson` crate

use geo_types::Geometry;
use geojson::GeoJson;

use crate::error::FormatError;
use crate::model::{Feature, FeatureCollection};

const FORMAT: &str = "GeoJSON";

/// Parse GeoJSON text into a collection
///
/// A bare Feature or Geometry becomes a one-element collection. Features
/// with a null geometry are skipped.
pub fn parse(text: &str) -> Result<FeatureCollection, FormatError> {
    let document: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| FormatError::parse(FORMAT, e.to_string()))?;

    let raw_features = match document {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => {
            let geometry = convert_geometry(geometry)?;
            return Ok(FeatureCollection::new(vec![Feature::new(geometry)]));
        }
    };

    let mut features = Vec::with_capacity(raw_features.len());
    let mut skipped = 0usize;
    for raw in raw_features {
        let Some(geometry) = raw.geometry else {
            skipped += 1;
            continue;
        };
        let geometry = convert_geometry(geometry)?;
        features.push(Feature::with_properties(
            geometry,
            raw.properties.unwrap_or_default(),
        ));
    }
    if skipped > 0 {
        log::warn!("skipped {skipped} GeoJSON features without geometry");
    }
    Ok(FeatureCollection::new(features))
}

/// Parse a single GeoJSON geometry object
pub fn parse_geometry(text: &str) -> Result<Geometry<f64>, FormatError> {
    let document: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| FormatError::parse(FORMAT, e.to_string()))?;
    match document {
        GeoJson::Geometry(geometry) => convert_geometry(geometry),
        _ => Err(FormatError::parse(FORMAT, "expected a geometry object")),
    }
}

fn convert_geometry(geometry: geojson::Geometry) -> Result<Geometry<f64>, FormatError> {
    Geometry::<f64>::try_from(geometry.value).map_err(|e| FormatError::parse(FORMAT, e.to_string()))
}

/// GeoJSON geometry object for a geometry
pub fn geometry_object(geometry: &Geometry<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

/// Build a `geojson` FeatureCollection from a collection
pub fn to_document(collection: &FeatureCollection) -> geojson::FeatureCollection {
    let features = collection
        .iter()
        .map(|feature| geojson::Feature {
            bbox: None,
            geometry: Some(geometry_object(&feature.geometry)),
            id: None,
            properties: Some(feature.properties.clone()),
            foreign_members: None,
        })
        .collect();
    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Serialize a collection as GeoJSON FeatureCollection text
pub fn to_string(collection: &FeatureCollection) -> String {
    GeoJson::from(to_document(collection)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_collection_skips_null_geometry() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {"name": "a"}},
                {"type": "Feature", "geometry": null, "properties": {"name": "b"}}
            ]
        }"#;
        let collection = parse(text).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.features[0].properties["name"], "a");
        assert_eq!(collection.features[0].geometry_type(), "Point");
    }

    #[test]
    fn test_bare_geometry_and_feature_normalise() {
        let geometry = parse(r#"{"type": "LineString", "coordinates": [[0, 0], [1, 1]]}"#).unwrap();
        assert_eq!(geometry.len(), 1);
        assert!(geometry.features[0].properties.is_empty());

        let feature = parse(
            r#"{"type": "Feature", "geometry": {"type": "Point", "coordinates": [0, 0]}, "properties": null}"#,
        )
        .unwrap();
        assert_eq!(feature.len(), 1);
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(matches!(
            parse(r#"{"type": "Nonsense"}"#),
            Err(FormatError::Parse { .. })
        ));
        assert!(matches!(parse("not json"), Err(FormatError::Parse { .. })));
    }

    #[test]
    fn test_export_then_parse_preserves_types() {
        let text = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}, "properties": {"n": 1}},
            {"type": "Feature", "geometry": {"type": "Point", "coordinates": [5, 5]}, "properties": {}}
        ]}"#;
        let original = parse(text).unwrap();
        let reparsed = parse(&to_string(&original)).unwrap();
        assert_eq!(reparsed.len(), original.len());
        assert_eq!(reparsed.geometry_type_labels(), original.geometry_type_labels());
        assert_eq!(reparsed.features[0].properties["n"], 1);
    }
}
