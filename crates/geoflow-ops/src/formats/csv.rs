//! CSV with a WKT/GeoJSON geometry column or a lat/lng column pair

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Trim, WriterBuilder};
use geo_types::{point, Geometry};
use serde_json::Value;

use crate::error::FormatError;
use crate::formats::GeometryEncoding;
use crate::model::{Feature, FeatureCollection, Properties};

const FORMAT: &str = "CSV";

const GEOMETRY_HEADERS: &[&str] = &["geometry", "geom", "wkt", "the_geom"];
const LATITUDE_HEADERS: &[&str] = &["lat", "latitude", "y"];
const LONGITUDE_HEADERS: &[&str] = &["lng", "lon", "long", "longitude", "x"];

/// Where a row's geometry comes from
#[derive(Debug, Clone, Copy)]
enum GeometrySource {
    Column(usize),
    LatLng { lat: usize, lng: usize },
}

impl GeometrySource {
    fn detect(headers: &StringRecord) -> Option<Self> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
        };
        if let Some(column) = find(GEOMETRY_HEADERS) {
            return Some(Self::Column(column));
        }
        match (find(LATITUDE_HEADERS), find(LONGITUDE_HEADERS)) {
            (Some(lat), Some(lng)) => Some(Self::LatLng { lat, lng }),
            _ => None,
        }
    }

    fn is_geometry_column(&self, index: usize) -> bool {
        match *self {
            Self::Column(column) => index == column,
            Self::LatLng { lat, lng } => index == lat || index == lng,
        }
    }

    fn read(&self, record: &StringRecord) -> Result<Geometry<f64>, String> {
        match *self {
            Self::Column(column) => {
                let cell = record.get(column).unwrap_or("").trim();
                if cell.is_empty() {
                    Err("empty geometry cell".to_string())
                } else if cell.starts_with('{') {
                    super::geojson::parse_geometry(cell).map_err(|e| e.to_string())
                } else {
                    super::wkt::parse_geometry(cell).map_err(|e| e.to_string())
                }
            }
            Self::LatLng { lat, lng } => {
                let number = |index: usize| -> Result<f64, String> {
                    let cell = record.get(index).unwrap_or("").trim();
                    cell.parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| format!("invalid coordinate '{cell}'"))
                };
                let (y, x) = (number(lat)?, number(lng)?);
                Ok(Geometry::Point(point!(x: x, y: y)))
            }
        }
    }
}

/// Typed value for a CSV cell
fn cell_value(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Some(number) = trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
    {
        return Value::Number(number);
    }
    Value::String(cell.to_string())
}

/// Parse CSV text; rows whose geometry cannot be read are skipped
pub fn parse(text: &str) -> Result<FeatureCollection, FormatError> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| FormatError::parse(FORMAT, e.to_string()))?
        .clone();

    let source = GeometrySource::detect(&headers).ok_or_else(|| {
        FormatError::parse(
            FORMAT,
            "no geometry column (geometry/geom/wkt/the_geom) or lat/lng columns found",
        )
    })?;

    let mut features = Vec::new();
    let mut skipped = 0usize;
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| FormatError::parse(FORMAT, e.to_string()))?;
        let geometry = match source.read(&record) {
            Ok(geometry) => geometry,
            Err(reason) => {
                skipped += 1;
                log::debug!("CSV row {} skipped: {reason}", row + 2);
                continue;
            }
        };
        let properties: Properties = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !source.is_geometry_column(*i))
            .map(|(i, name)| (name.to_string(), cell_value(record.get(i).unwrap_or(""))))
            .collect();
        features.push(Feature::with_properties(geometry, properties));
    }
    if skipped > 0 {
        log::warn!("skipped {skipped} CSV rows with unreadable geometry");
    }
    Ok(FeatureCollection::new(features))
}

/// Text written for a property value
fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Serialize a collection as CSV with every field quoted
///
/// Property columns come from the first feature's keys.
pub fn to_string(
    collection: &FeatureCollection,
    encoding: GeometryEncoding,
) -> Result<String, FormatError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    let columns: Vec<&String> = collection
        .features
        .first()
        .map(|f| f.properties.keys().collect())
        .unwrap_or_default();

    let encode_err = |e: csv::Error| FormatError::encode(FORMAT, e.to_string());
    writer
        .write_record(std::iter::once("geometry").chain(columns.iter().map(|c| c.as_str())))
        .map_err(encode_err)?;

    for feature in collection.iter() {
        let geometry = match encoding {
            GeometryEncoding::Wkt => super::wkt::to_wkt(&feature.geometry),
            GeometryEncoding::GeoJson => {
                geojson::GeoJson::Geometry(super::geojson::geometry_object(&feature.geometry))
                    .to_string()
            }
        };
        let record = std::iter::once(geometry).chain(
            columns
                .iter()
                .map(|c| cell_text(feature.properties.get(c.as_str()))),
        );
        writer.write_record(record).map_err(encode_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| FormatError::encode(FORMAT, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| FormatError::encode(FORMAT, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lat_lng_columns_with_typed_cells() {
        let text = "Name,LAT,Lng,pop,capital,note\nParis,48.85,2.35,2148000,true,\nNowhere,,,1,false,x\n";
        let collection = parse(text).unwrap();

        assert_eq!(collection.len(), 1);
        let feature = &collection.features[0];
        let Geometry::Point(p) = &feature.geometry else {
            panic!("expected a point");
        };
        assert_eq!((p.x(), p.y()), (2.35, 48.85));
        assert_eq!(feature.properties["Name"], "Paris");
        assert_eq!(feature.properties["pop"], 2148000);
        assert_eq!(feature.properties["capital"], true);
        assert!(feature.properties["note"].is_null());
        assert!(!feature.properties.contains_key("LAT"));
    }

    #[test]
    fn test_parse_wkt_column() {
        let text = "id,WKT\n1,\"POLYGON ((0 0, 1 0, 1 1, 0 0))\"\n2,\"LINESTRING (0 0, 2 2)\"\n";
        let collection = parse(text).unwrap();
        assert_eq!(collection.geometry_type_labels(), vec!["LineString", "Polygon"]);
        assert_eq!(collection.features[0].properties["id"], 1);
    }

    #[test]
    fn test_parse_without_geometry_columns_fails() {
        assert!(matches!(
            parse("name,value\na,1\n"),
            Err(FormatError::Parse { .. })
        ));
    }

    #[test]
    fn test_export_quotes_every_field() {
        let text = "geometry,name,score\n\"POINT (1 2)\",a,3.5\n";
        let collection = parse(text).unwrap();
        let csv = to_string(&collection, GeometryEncoding::Wkt).unwrap();

        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("\"geometry\",\"name\",\"score\""));
        let row = lines.next().unwrap();
        assert!(row.starts_with("\"POINT"), "{row}");
        assert!(row.ends_with(",\"a\",\"3.5\""), "{row}");

        let reparsed = parse(&csv).unwrap();
        assert_eq!(reparsed.features[0].properties["score"], 3.5);
    }

    #[test]
    fn test_export_geojson_encoding_reparses() {
        let collection = parse("lat,lon,name\n1,2,a\n").unwrap();
        let csv = to_string(&collection, GeometryEncoding::GeoJson).unwrap();
        let reparsed = parse(&csv).unwrap();
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed.features[0].geometry, collection.features[0].geometry);
        assert_eq!(reparsed.features[0].properties["name"], "a");
    }
}
