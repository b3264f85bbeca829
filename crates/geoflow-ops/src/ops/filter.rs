//! Filter: keep features whose properties satisfy an expression

use serde::{Deserialize, Serialize};

use crate::config::parse_config;
use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::Result;
use crate::expr::Expression;
use crate::model::{ConfigMap, FeatureCollection};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub expression: String,
}

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "filter",
        OperationCategory::Transform,
        "Filter",
        "Keep features matching a property expression",
    )
    .with_input(PortSpec::required(ports::INPUT, "Input"))
    .with_defaults(&FilterConfig::default())
}

/// Features for which the expression errors are kept, never dropped
pub fn apply(
    input: &FeatureCollection,
    config: &ConfigMap,
    _secondary: Option<&FeatureCollection>,
) -> Result<FeatureCollection> {
    let config: FilterConfig = parse_config(config)?;
    let source = config.expression.trim();
    if source.is_empty() {
        return Ok(input.clone());
    }
    let expression = match Expression::parse(source) {
        Ok(expression) => expression,
        Err(e) => {
            log::warn!("filter expression '{source}' is invalid, keeping all features: {e}");
            return Ok(input.clone());
        }
    };

    let mut errors = 0usize;
    let output: FeatureCollection = input
        .iter()
        .filter(|feature| match expression.matches(&feature.properties) {
            Ok(keep) => keep,
            Err(e) => {
                errors += 1;
                log::debug!("filter kept a feature after an evaluation error: {e}");
                true
            }
        })
        .cloned()
        .collect();

    if errors > 0 {
        log::warn!("filter could not evaluate '{source}' for {errors} features; they were kept");
    }
    Ok(output)
}

inventory::submit! {
    OperationEntry { descriptor, apply }
}
