//! Custom script sandbox
//!
//! User scripts run in an embedded boa JavaScript context with no host
//! functions registered, so there is no network, filesystem or clock
//! access. Each run gets a fresh context with loop and recursion limits and
//! runs on the blocking pool under a wall-clock timeout.
//!
//! The script is the body of `function (features, geo, collection)` and must
//! return a FeatureCollection object or an array of features. The result is
//! stringified inside the sandbox and read back as GeoJSON.

use async_trait::async_trait;
use boa_engine::{Context, Source};
use geoflow_ops::config::parse_config;
use geoflow_ops::formats::geojson;
use geoflow_ops::{ports, FeatureCollection, OperationCategory, OperationDescriptor, PortSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SandboxConfig;
use crate::error::{GeoflowError, Result};
use crate::registry::{ExecutionResources, OperationHandler, OperationOutput, OperationRequest};

pub const CUSTOM_SCRIPT: &str = "custom-script";

const PRELUDE: &str = include_str!("sandbox_prelude.js");

/// Runs user scripts against a collection
#[derive(Debug, Clone, Default)]
pub struct ScriptSandbox {
    config: SandboxConfig,
}

impl ScriptSandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `code` with `input` bound as `features` and `collection`
    pub async fn run(&self, code: &str, input: &FeatureCollection) -> Result<FeatureCollection> {
        let script = build_script(code, &geojson::to_string(input))?;
        let limits = self.config.clone();
        let task = tokio::task::spawn_blocking(move || evaluate(&script, &limits));

        let output = match tokio::time::timeout(self.config.timeout(), task).await {
            Err(_) => {
                return Err(GeoflowError::script(format!(
                    "script exceeded its {} ms time limit",
                    self.config.timeout_ms
                )))
            }
            Ok(Err(join)) => return Err(GeoflowError::script(format!("script worker stopped: {join}"))),
            Ok(Ok(output)) => output?,
        };
        decode_output(&output)
    }
}

fn build_script(code: &str, input_json: &str) -> Result<String> {
    let input_literal = serde_json::to_string(input_json)?;
    Ok(format!(
        r#""use strict";
(function () {{
{prelude}
  const geo = createGeo();
  const collection = JSON.parse({input_literal});
  const transform = function (features, geo, collection) {{
{code}
  }};
  try {{
    const value = transform(collection.features, geo, collection);
    return JSON.stringify({{ ok: true, value: value === undefined ? null : value }});
  }} catch (e) {{
    const message = e && e.message !== undefined ? e.message : e;
    return JSON.stringify({{ ok: false, error: String(message) }});
  }}
}})();
"#,
        prelude = PRELUDE,
        input_literal = input_literal,
        code = code,
    ))
}

/// Evaluate in a fresh context; returns the stringified result envelope
fn evaluate(script: &str, limits: &SandboxConfig) -> Result<String> {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(limits.loop_iteration_limit);
    context
        .runtime_limits_mut()
        .set_recursion_limit(limits.recursion_limit);

    let value = context
        .eval(Source::from_bytes(script.as_bytes()))
        .map_err(|e| GeoflowError::script(format!("script failed: {e}")))?;
    value
        .to_string(&mut context)
        .map(|s| s.to_std_string_escaped())
        .map_err(|e| GeoflowError::script(format!("script result unreadable: {e}")))
}

#[derive(Debug, Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn decode_output(output: &str) -> Result<FeatureCollection> {
    let envelope: Envelope = serde_json::from_str(output)
        .map_err(|e| GeoflowError::script(format!("script result unreadable: {e}")))?;
    if !envelope.ok {
        return Err(GeoflowError::script(format!(
            "script threw: {}",
            envelope.error.unwrap_or_default()
        )));
    }

    let document = match envelope.value {
        Value::Array(features) => serde_json::json!({
            "type": "FeatureCollection",
            "features": features,
        }),
        value @ Value::Object(_)
            if value.get("type").and_then(Value::as_str) == Some("FeatureCollection") =>
        {
            value
        }
        other => {
            return Err(GeoflowError::script(format!(
                "script must return a FeatureCollection or an array of features, got {}",
                json_kind(&other)
            )))
        }
    };

    geojson::parse(&document.to_string())
        .map_err(|e| GeoflowError::script(format!("script returned invalid features: {e}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub code: String,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            code: "return features;".to_string(),
        }
    }
}

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        CUSTOM_SCRIPT,
        OperationCategory::Script,
        "Custom Script",
        "Transform features with a sandboxed JavaScript function body",
    )
    .with_input(PortSpec::required(ports::INPUT, "Input"))
    .with_defaults(&ScriptConfig::default())
}

pub struct CustomScriptHandler;

#[async_trait]
impl OperationHandler for CustomScriptHandler {
    async fn execute(
        &self,
        request: OperationRequest,
        resources: &ExecutionResources,
    ) -> Result<OperationOutput> {
        let primary = request.require_primary()?;
        let config: ScriptConfig = parse_config(&request.config)?;
        if config.code.trim().is_empty() {
            return Err(GeoflowError::validation("custom script has no code"));
        }
        log::debug!(
            "custom-script {}: running against {} features",
            request.node_id,
            primary.len()
        );
        let output = resources.sandbox.run(&config.code, primary).await?;
        Ok(OperationOutput::collection(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use geo_types::{point, Geometry};
    use geoflow_ops::{Feature, Properties};
    use serde_json::json;

    fn input() -> FeatureCollection {
        let features = [(0.0, 0.0, true), (2.0, 4.0, false), (10.0, 10.0, true)]
            .into_iter()
            .map(|(x, y, keep)| {
                let mut props = Properties::new();
                props.insert("keep".to_string(), json!(keep));
                Feature::with_properties(point!(x: x, y: y), props)
            })
            .collect();
        FeatureCollection::new(features)
    }

    fn limited() -> ScriptSandbox {
        ScriptSandbox::new(SandboxConfig {
            loop_iteration_limit: 10_000,
            ..SandboxConfig::default()
        })
    }

    #[tokio::test]
    async fn test_array_result_is_wrapped() {
        let output = limited()
            .run("return features.filter(f => f.properties.keep);", &input())
            .await
            .unwrap();
        assert_eq!(output.len(), 2);
    }

    #[tokio::test]
    async fn test_geo_helpers() {
        let code = "return geo.featureCollection([geo.centroid(collection, { n: features.length })]);";
        let output = limited().run(code, &input()).await.unwrap();

        assert_eq!(output.len(), 1);
        assert_eq!(output.features[0].properties["n"], 3);
        let Geometry::Point(p) = &output.features[0].geometry else {
            panic!("expected a point");
        };
        assert!((p.x() - 4.0).abs() < 1e-9);
        assert!((p.y() - 14.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_wrong_return_shape() {
        let err = limited().run("return 42;", &input()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScriptContract);
        assert!(err.to_string().contains("a number"));

        let err = limited()
            .run("return { type: 'Feature' };", &input())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScriptContract);
    }

    #[tokio::test]
    async fn test_thrown_error_is_reported() {
        let err = limited()
            .run("throw new Error('bad data');", &input())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScriptContract);
        assert!(err.to_string().contains("bad data"));
    }

    #[tokio::test]
    async fn test_syntax_error() {
        let err = limited().run("return (;", &input()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScriptContract);
    }

    #[tokio::test]
    async fn test_runaway_loop_is_stopped() {
        let err = limited().run("while (true) {}", &input()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScriptContract);
    }

    #[tokio::test]
    async fn test_unbounded_recursion_is_stopped() {
        let err = limited()
            .run("function f(n) { return f(n + 1); } return f(0);", &input())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ScriptContract);
    }

    #[tokio::test]
    async fn test_no_host_capabilities() {
        let code = "return [geo.point([0, 0], { fetch: typeof fetch, require: typeof require, process: typeof process })];";
        let output = limited().run(code, &input()).await.unwrap();
        let props = &output.features[0].properties;
        for name in ["fetch", "require", "process"] {
            assert_eq!(props[name], "undefined", "{name} is reachable");
        }
    }

    #[tokio::test]
    async fn test_input_is_not_modified() {
        let original = input();
        let output = limited()
            .run("features[0].properties.keep = 'changed'; return [];", &original)
            .await
            .unwrap();
        assert!(output.is_empty());
        assert_eq!(original.features[0].properties["keep"], true);
    }
}
