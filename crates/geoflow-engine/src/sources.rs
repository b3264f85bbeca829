//! Source operations: data from uploads, the filesystem, or HTTP
//!
//! Sources have no input ports. `file-input` prefers bytes handed to the
//! engine with `Engine::upload`, then falls back to a `path` in its config.
//! `url-input` fetches a JSON body that must parse as GeoJSON.

use std::path::Path;

use async_trait::async_trait;
use geoflow_ops::config::{lenient, parse_config};
use geoflow_ops::formats;
use geoflow_ops::{OperationCategory, OperationDescriptor};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::{GeoflowError, Result};
use crate::registry::{ExecutionResources, OperationHandler, OperationOutput, OperationRequest};

pub const FILE_INPUT: &str = "file-input";
pub const URL_INPUT: &str = "url-input";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileInputConfig {
    /// File read when nothing was uploaded
    #[serde(deserialize_with = "lenient::opt_string")]
    pub path: Option<String>,
    /// Overrides the name used to pick the format
    #[serde(deserialize_with = "lenient::opt_string")]
    pub file_name: Option<String>,
}

pub fn file_input_descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        FILE_INPUT,
        OperationCategory::Source,
        "File Input",
        "Load GeoJSON, CSV or WKT from an uploaded or local file",
    )
    .with_defaults(&FileInputConfig::default())
}

pub struct FileInputHandler;

#[async_trait]
impl OperationHandler for FileInputHandler {
    async fn execute(
        &self,
        request: OperationRequest,
        _resources: &ExecutionResources,
    ) -> Result<OperationOutput> {
        let config: FileInputConfig = parse_config(&request.config)?;

        let (file_name, bytes) = if let Some(upload) = request.upload {
            let name = config.file_name.unwrap_or(upload.file_name);
            (name, upload.bytes.to_vec())
        } else if let Some(path) = config.path {
            let name = config.file_name.unwrap_or_else(|| {
                Path::new(&path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(path.as_str())
                    .to_string()
            });
            // Reject the extension before touching the disk
            formats::InputFormat::from_file_name(&name)?;
            let bytes = tokio::fs::read(&path).await?;
            (name, bytes)
        } else {
            return Err(GeoflowError::validation(format!(
                "no file uploaded for node '{}'",
                request.node_id
            )));
        };

        log::debug!(
            "file-input {}: parsing {} ({} bytes)",
            request.node_id,
            file_name,
            bytes.len()
        );
        let collection = formats::parse_bytes(&file_name, &bytes)?;
        Ok(OperationOutput::collection(collection))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlInputConfig {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub url: Option<String>,
    pub method: String,
    /// Request body for POST; objects are sent as JSON text
    pub body: Option<serde_json::Value>,
}

impl Default for UrlInputConfig {
    fn default() -> Self {
        Self {
            url: None,
            method: "GET".to_string(),
            body: None,
        }
    }
}

impl UrlInputConfig {
    fn method(&self) -> Result<Method> {
        match self.method.trim().to_ascii_uppercase().as_str() {
            "" | "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            other => Err(GeoflowError::validation(format!(
                "unsupported HTTP method '{other}' (expected GET or POST)"
            ))),
        }
    }

    fn body_text(&self) -> Option<String> {
        match &self.body {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

pub fn url_input_descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        URL_INPUT,
        OperationCategory::Source,
        "URL Input",
        "Fetch a GeoJSON document over HTTP",
    )
    .with_defaults(&UrlInputConfig::default())
}

pub struct UrlInputHandler;

#[async_trait]
impl OperationHandler for UrlInputHandler {
    async fn execute(
        &self,
        request: OperationRequest,
        resources: &ExecutionResources,
    ) -> Result<OperationOutput> {
        let config: UrlInputConfig = parse_config(&request.config)?;
        let method = config.method()?;
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| GeoflowError::validation("no URL given"))?;

        let mut http_request = resources.http.request(method.clone(), url);
        if let Some(timeout) = resources.http_timeout {
            http_request = http_request.timeout(timeout);
        }
        if method == Method::POST {
            if let Some(body) = config.body_text() {
                http_request = http_request.header(CONTENT_TYPE, "application/json").body(body);
            }
        }

        log::debug!("url-input {}: {} {}", request.node_id, method, url);

        let response = http_request
            .send()
            .await
            .map_err(|e| GeoflowError::network(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoflowError::network(format!(
                "{url} responded with HTTP {status}"
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| GeoflowError::network(format!("reading response from {url}: {e}")))?;
        let collection = formats::geojson::parse(&text)?;
        Ok(OperationOutput::collection(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SandboxConfig;
    use crate::error::ErrorKind;
    use crate::registry::Upload;
    use crate::sandbox::ScriptSandbox;
    use serde_json::json;
    use std::io::Write;

    fn resources() -> ExecutionResources {
        ExecutionResources {
            http: reqwest::Client::new(),
            http_timeout: None,
            sandbox: ScriptSandbox::new(SandboxConfig::default()),
        }
    }

    fn request(config: serde_json::Value, upload: Option<Upload>) -> OperationRequest {
        let serde_json::Value::Object(config) = config else {
            panic!("config must be an object");
        };
        OperationRequest {
            node_id: "src".to_string(),
            config,
            primary: None,
            secondary: None,
            upload,
        }
    }

    #[tokio::test]
    async fn test_file_input_reads_upload() {
        let upload = Upload::new("points.csv", b"lat,lng,name\n1,2,a\n3,4,b\n".to_vec());
        let output = FileInputHandler
            .execute(request(json!({}), Some(upload)), &resources())
            .await
            .unwrap();
        assert_eq!(output.collection.len(), 2);
        assert!(output.artifact.is_none());
    }

    #[tokio::test]
    async fn test_file_input_without_upload_is_validation_error() {
        let err = FileInputHandler
            .execute(request(json!({}), None), &resources())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_file_input_reads_path() {
        let mut file = tempfile::Builder::new().suffix(".wkt").tempfile().unwrap();
        writeln!(file, "POINT (1 2)").unwrap();
        writeln!(file, "LINESTRING (0 0, 1 1)").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let output = FileInputHandler
            .execute(request(json!({ "path": path }), None), &resources())
            .await
            .unwrap();
        assert_eq!(output.collection.len(), 2);
        assert_eq!(output.collection.features[1].properties["id"], 2);
    }

    #[tokio::test]
    async fn test_file_input_rejects_unknown_extension() {
        let upload = Upload::new("roads.shp", vec![0u8; 4]);
        let err = FileInputHandler
            .execute(request(json!({}), Some(upload)), &resources())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
        assert!(err.to_string().contains(".shp"));
    }

    #[tokio::test]
    async fn test_url_input_requires_url() {
        let err = UrlInputHandler
            .execute(request(json!({ "url": "" }), None), &resources())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_url_input_rejects_unknown_method() {
        let err = UrlInputHandler
            .execute(
                request(json!({ "url": "http://localhost/x", "method": "DELETE" }), None),
                &resources(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("DELETE"));
    }

    #[tokio::test]
    async fn test_url_input_connection_failure_is_network_error() {
        // port 9 (discard) on loopback refuses connections
        let err = UrlInputHandler
            .execute(request(json!({ "url": "http://127.0.0.1:9/data.geojson" }), None), &resources())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_defaults_are_source_descriptors() {
        assert!(file_input_descriptor().is_source());
        let url = url_input_descriptor();
        assert!(url.is_source());
        assert_eq!(url.default_config["method"], "GET");
    }
}
