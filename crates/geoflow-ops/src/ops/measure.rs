//! Measurements attached as properties: area and distance

use geo::{Centroid, ChamberlainDuquetteArea};
use geo_types::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{parse_config, AreaUnit, LengthUnit};
use crate::descriptor::{ports, OperationCategory, OperationDescriptor, OperationEntry, PortSpec};
use crate::error::Result;
use crate::geometry::{as_multi_polygon, haversine_meters};
use crate::model::{ConfigMap, FeatureCollection};
use crate::ops::require_secondary;

/// JSON number for a measurement, or null when it is not finite
fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub mod area {
    use super::*;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub struct AreaConfig {
        pub units: AreaUnit,
    }

    pub fn descriptor() -> OperationDescriptor {
        OperationDescriptor::new(
            "area",
            OperationCategory::Measure,
            "Area",
            "Attach the geodesic area of each feature",
        )
        .with_input(PortSpec::required(ports::INPUT, "Input"))
        .with_defaults(&AreaConfig::default())
    }

    /// Sets `area` and `area_units` on every feature; non-polygons measure 0
    pub fn apply(
        input: &FeatureCollection,
        config: &ConfigMap,
        _secondary: Option<&FeatureCollection>,
    ) -> Result<FeatureCollection> {
        let config: AreaConfig = parse_config(config)?;
        Ok(input
            .iter()
            .map(|feature| {
                let square_meters = as_multi_polygon(&feature.geometry)
                    .map(|mp| mp.chamberlain_duquette_unsigned_area())
                    .unwrap_or(0.0);
                let mut out = feature.clone();
                out.properties.insert(
                    "area".to_string(),
                    number(config.units.from_square_meters(square_meters)),
                );
                out.properties
                    .insert("area_units".to_string(), config.units.label().into());
                out
            })
            .collect())
    }

    inventory::submit! {
        OperationEntry { descriptor, apply }
    }
}

pub mod distance {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(default)]
    pub struct DistanceConfig {
        pub units: LengthUnit,
    }

    impl Default for DistanceConfig {
        fn default() -> Self {
            Self {
                units: LengthUnit::Kilometers,
            }
        }
    }

    pub fn descriptor() -> OperationDescriptor {
        OperationDescriptor::new(
            "distance",
            OperationCategory::Measure,
            "Distance",
            "Attach the distance to the nearest target centroid",
        )
        .with_input(PortSpec::required(ports::INPUT, "Input"))
        .with_input(PortSpec::required(ports::TARGETS, "Targets"))
        .with_defaults(&DistanceConfig::default())
    }

    /// Sets `distance` and `distance_units`; `distance` is null without targets
    pub fn apply(
        input: &FeatureCollection,
        config: &ConfigMap,
        secondary: Option<&FeatureCollection>,
    ) -> Result<FeatureCollection> {
        let config: DistanceConfig = parse_config(config)?;
        let targets: Vec<Point<f64>> = require_secondary(secondary, ports::TARGETS)?
            .iter()
            .filter_map(|f| f.geometry.centroid())
            .collect();

        Ok(input
            .iter()
            .map(|feature| {
                let nearest = feature.geometry.centroid().and_then(|origin| {
                    targets
                        .iter()
                        .map(|target| haversine_meters(origin, *target))
                        .min_by(f64::total_cmp)
                });
                let mut out = feature.clone();
                out.properties.insert(
                    "distance".to_string(),
                    nearest
                        .map(|m| number(config.units.from_meters(m)))
                        .unwrap_or(Value::Null),
                );
                out.properties
                    .insert("distance_units".to_string(), config.units.label().into());
                out
            })
            .collect())
    }

    inventory::submit! {
        OperationEntry { descriptor, apply }
    }
}
