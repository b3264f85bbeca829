//! Format adapters between raw file bytes and [`FeatureCollection`]
//!
//! Input format is chosen by file extension. Export supports GeoJSON and a
//! quoted CSV with one geometry column.

pub mod csv;
pub mod geojson;
pub mod wkt;

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::model::FeatureCollection;

/// Readable input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    GeoJson,
    Csv,
    Wkt,
}

impl InputFormat {
    /// Pick a format from a file name's extension (case-insensitive)
    pub fn from_file_name(file_name: &str) -> Result<Self, FormatError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "geojson" | "json" => Ok(Self::GeoJson),
            "csv" => Ok(Self::Csv),
            "wkt" | "txt" => Ok(Self::Wkt),
            _ => Err(FormatError::unsupported(if extension.is_empty() {
                file_name.to_string()
            } else {
                format!(".{extension}")
            })),
        }
    }

    pub fn parse_str(self, text: &str) -> Result<FeatureCollection, FormatError> {
        match self {
            Self::GeoJson => self::geojson::parse(text),
            Self::Csv => self::csv::parse(text),
            Self::Wkt => self::wkt::parse(text),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::GeoJson => "GeoJSON",
            Self::Csv => "CSV",
            Self::Wkt => "WKT",
        }
    }
}

/// Parse uploaded or fetched bytes, dispatching on the file name
pub fn parse_bytes(file_name: &str, bytes: &[u8]) -> Result<FeatureCollection, FormatError> {
    let format = InputFormat::from_file_name(file_name)?;
    let text = std::str::from_utf8(bytes)
        .map_err(|e| FormatError::parse(format.label(), format!("input is not UTF-8: {e}")))?;
    format.parse_str(text.trim_start_matches('\u{feff}'))
}

/// Export file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    GeoJson,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::GeoJson => "geojson",
            Self::Csv => "csv",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::GeoJson => "application/geo+json",
            Self::Csv => "text/csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "geojson" | "json" => Ok(Self::GeoJson),
            "csv" => Ok(Self::Csv),
            other => Err(FormatError::unsupported(other)),
        }
    }
}

/// How the CSV geometry column is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryEncoding {
    #[default]
    Wkt,
    GeoJson,
}

impl FromStr for GeometryEncoding {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wkt" | "" => Ok(Self::Wkt),
            "geojson" | "json" => Ok(Self::GeoJson),
            other => Err(FormatError::unsupported(other)),
        }
    }
}

/// Serialize a collection in an export format
pub fn export(
    collection: &FeatureCollection,
    format: ExportFormat,
    encoding: GeometryEncoding,
) -> Result<String, FormatError> {
    match format {
        ExportFormat::GeoJson => Ok(self::geojson::to_string(collection)),
        ExportFormat::Csv => self::csv::to_string(collection, encoding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(InputFormat::from_file_name("a.GeoJSON").unwrap(), InputFormat::GeoJson);
        assert_eq!(InputFormat::from_file_name("dir/b.csv").unwrap(), InputFormat::Csv);
        assert_eq!(InputFormat::from_file_name("c.txt").unwrap(), InputFormat::Wkt);
    }

    #[test]
    fn test_unsupported_extension_is_named() {
        let err = parse_bytes("roads.shp", b"").unwrap_err();
        assert_eq!(
            err,
            FormatError::UnsupportedFormat {
                extension: ".shp".to_string()
            }
        );
        assert!(err.to_string().contains(".shp"));
    }

    #[test]
    fn test_parse_bytes_strips_bom() {
        let mut bytes = "\u{feff}".as_bytes().to_vec();
        bytes.extend_from_slice(br#"{"type": "Point", "coordinates": [1, 1]}"#);
        assert_eq!(parse_bytes("p.json", &bytes).unwrap().len(), 1);
    }

    #[test]
    fn test_export_format_parsing() {
        assert_eq!("GeoJSON".parse::<ExportFormat>().unwrap(), ExportFormat::GeoJson);
        assert!(matches!(
            "kml".parse::<ExportFormat>(),
            Err(FormatError::UnsupportedFormat { .. })
        ));
    }
}
