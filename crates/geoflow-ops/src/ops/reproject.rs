//! Reproject: coordinate reference passthrough
//!
//! All collections are WGS84 lon/lat. A request for another target CRS is
//! logged and the input is returned unchanged.

use serde::{Deserialize, Serialize};

use crate::config::parse_config;
use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::Result;
use crate::model::{ConfigMap, FeatureCollection, DEFAULT_CRS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReprojectConfig {
    #[serde(rename = "targetCRS", alias = "targetCrs")]
    pub target_crs: String,
}

impl Default for ReprojectConfig {
    fn default() -> Self {
        Self {
            target_crs: DEFAULT_CRS.to_string(),
        }
    }
}

pub fn descriptor() -> OperationDescriptor {
    OperationDescriptor::new(
        "reproject",
        OperationCategory::Transform,
        "Reproject",
        "Label the collection with a target coordinate reference system",
    )
    .with_input(PortSpec::required(ports::INPUT, "Input"))
    .with_defaults(&ReprojectConfig::default())
}

pub fn apply(
    input: &FeatureCollection,
    config: &ConfigMap,
    _secondary: Option<&FeatureCollection>,
) -> Result<FeatureCollection> {
    let config: ReprojectConfig = parse_config(config)?;
    if !config.target_crs.trim().eq_ignore_ascii_case(DEFAULT_CRS) {
        log::warn!(
            "reproject to '{}' is not supported; coordinates stay in {DEFAULT_CRS}",
            config.target_crs
        );
    }
    Ok(input.clone())
}

inventory::submit! {
    OperationEntry { descriptor, apply }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Feature;
    use crate::ops::test_support::config;
    use geo_types::point;
    use serde_json::json;

    #[test]
    fn test_reproject_is_passthrough() {
        let input = FeatureCollection::new(vec![Feature::new(point!(x: 13.4, y: 52.5))]);
        let output = apply(&input, &config(json!({"targetCRS": "EPSG:3857"})), None).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_reproject_default_target() {
        let descriptor = descriptor();
        assert_eq!(descriptor.default_config["targetCRS"], "EPSG:4326");
    }
}
