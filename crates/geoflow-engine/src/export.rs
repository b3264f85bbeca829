//! Export: serialize a collection to a downloadable file

use async_trait::async_trait;
use geoflow_ops::config::parse_config;
use geoflow_ops::formats::{self, ExportFormat, GeometryEncoding};
use geoflow_ops::{ports, OperationCategory, OperationDescriptor, PortSpec};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::{ExecutionResources, OperationHandler, OperationOutput, OperationRequest};

pub const EXPORT: &str = "export";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportConfig {
    /// `geojson` or `csv`
    pub format: String,
    pub file_name: String,
    /// Geometry column encoding for CSV: `wkt` or `geojson`
    pub geometry_encoding: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: "geojson".to_string(),
            file_name: "export".to_string(),
            geometry_encoding: "wkt".to_string(),
        }
    }
}

/// A file produced by an export node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub file_name: String,
    pub media_type: String,
    pub content: String,
}

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        EXPORT,
        OperationCategory::Output,
        "Export",
        "Write the input collection as GeoJSON or CSV",
    )
    .with_input(PortSpec::required(ports::INPUT, "Input"))
    .with_defaults(&ExportConfig::default())
}

fn file_name_with_extension(base: &str, format: ExportFormat) -> String {
    let base = base.trim();
    let base = if base.is_empty() { "export" } else { base };
    let suffix = format!(".{}", format.extension());
    if base.to_ascii_lowercase().ends_with(&suffix) {
        base.to_string()
    } else {
        format!("{base}{suffix}")
    }
}

pub struct ExportHandler;

#[async_trait]
impl OperationHandler for ExportHandler {
    async fn execute(
        &self,
        request: OperationRequest,
        _resources: &ExecutionResources,
    ) -> Result<OperationOutput> {
        let primary = request.require_primary()?;
        let config: ExportConfig = parse_config(&request.config)?;
        let format: ExportFormat = config.format.parse()?;
        let encoding: GeometryEncoding = config.geometry_encoding.parse()?;

        let content = formats::export(primary, format, encoding)?;
        let artifact = ExportArtifact {
            file_name: file_name_with_extension(&config.file_name, format),
            media_type: format.media_type().to_string(),
            content,
        };
        log::info!(
            "export {}: wrote {} ({} features)",
            request.node_id,
            artifact.file_name,
            primary.len()
        );

        Ok(OperationOutput {
            collection: primary.clone(),
            artifact: Some(artifact),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use crate::error::ErrorKind;
    use crate::sandbox::ScriptSandbox;
    use geoflow_ops::{Feature, FeatureCollection};
    use geo_types::point;
    use serde_json::json;
    use std::sync::Arc;

    fn resources() -> ExecutionResources {
        ExecutionResources {
            http: reqwest::Client::new(),
            http_timeout: None,
            sandbox: ScriptSandbox::new(SandboxConfig::default()),
        }
    }

    fn request(config: serde_json::Value) -> OperationRequest {
        let serde_json::Value::Object(config) = config else {
            panic!("config must be an object");
        };
        let mut props = geoflow_ops::Properties::new();
        props.insert("name".to_string(), json!("a"));
        let input = FeatureCollection::new(vec![Feature::with_properties(
            point!(x: 1.0, y: 2.0),
            props,
        )]);
        OperationRequest {
            node_id: "out".to_string(),
            config,
            primary: Some(Arc::new(input)),
            secondary: None,
            upload: None,
        }
    }

    #[test]
    fn test_file_name_gets_one_extension() {
        assert_eq!(file_name_with_extension("parcels", ExportFormat::Csv), "parcels.csv");
        assert_eq!(
            file_name_with_extension("parcels.GeoJSON", ExportFormat::GeoJson),
            "parcels.GeoJSON"
        );
        assert_eq!(file_name_with_extension(" ", ExportFormat::GeoJson), "export.geojson");
    }

    #[tokio::test]
    async fn test_export_geojson_passes_input_through() {
        let output = ExportHandler
            .execute(request(json!({})), &resources())
            .await
            .unwrap();
        assert_eq!(output.collection.len(), 1);

        let artifact = output.artifact.unwrap();
        assert_eq!(artifact.file_name, "export.geojson");
        assert_eq!(artifact.media_type, "application/geo+json");
        let reparsed = formats::geojson::parse(&artifact.content).unwrap();
        assert_eq!(reparsed.len(), 1);
    }

    #[tokio::test]
    async fn test_export_csv() {
        let output = ExportHandler
            .execute(request(json!({ "format": "csv", "fileName": "pts" })), &resources())
            .await
            .unwrap();
        let artifact = output.artifact.unwrap();
        assert_eq!(artifact.file_name, "pts.csv");
        assert!(artifact.content.starts_with("\"geometry\",\"name\""));
    }

    #[tokio::test]
    async fn test_unknown_format_is_unsupported() {
        let err = ExportHandler
            .execute(request(json!({ "format": "kml" })), &resources())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }
}
