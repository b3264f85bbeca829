//! Line-oriented WKT: one geometry per non-blank line

use geo_types::Geometry;
use serde_json::Value;
use wkt::{ToWkt, TryFromWkt};

use crate::error::FormatError;
use crate::model::{Feature, FeatureCollection, Properties};

const FORMAT: &str = "WKT";

/// Parse one WKT geometry string
pub fn parse_geometry(text: &str) -> Result<Geometry<f64>, FormatError> {
    Geometry::<f64>::try_from_wkt_str(text.trim())
        .map_err(|e| FormatError::parse(FORMAT, e.to_string()))
}

/// Parse WKT text; each line becomes a feature with a 1-based `id`
///
/// Only POINT, LINESTRING and POLYGON are accepted.
pub fn parse(text: &str) -> Result<FeatureCollection, FormatError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            let id = index + 1;
            let geometry = parse_geometry(line).map_err(|e| match e {
                FormatError::Parse { message, .. } => {
                    FormatError::parse(FORMAT, format!("line {id}: {message}"))
                }
                other => other,
            })?;
            if !matches!(
                geometry,
                Geometry::Point(_) | Geometry::LineString(_) | Geometry::Polygon(_)
            ) {
                return Err(FormatError::parse(
                    FORMAT,
                    format!("line {id}: only POINT, LINESTRING and POLYGON are supported"),
                ));
            }
            let mut properties = Properties::new();
            properties.insert("id".to_string(), Value::from(id));
            Ok(Feature::with_properties(geometry, properties))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(FeatureCollection::new)
}

/// WKT text for one geometry
pub fn to_wkt(geometry: &Geometry<f64>) -> String {
    geometry.wkt_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers_non_blank_lines() {
        let text = "POINT (1 2)\n\n  LINESTRING (0 0, 1 1)\nPOLYGON ((0 0, 1 0, 1 1, 0 0))\n";
        let collection = parse(text).unwrap();
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.features[1].properties["id"], 2);
        assert_eq!(collection.features[2].geometry_type(), "Polygon");
    }

    #[test]
    fn test_parse_rejects_multi_types() {
        let err = parse("POINT (0 0)\nMULTIPOINT ((0 0), (1 1))").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_parse_reports_malformed_line() {
        assert!(matches!(parse("POINT (1)"), Err(FormatError::Parse { .. })));
    }

    #[test]
    fn test_to_wkt_round_trips_point() {
        let g = parse_geometry("POINT(3 4)").unwrap();
        assert_eq!(parse_geometry(&to_wkt(&g)).unwrap(), g);
    }
}
