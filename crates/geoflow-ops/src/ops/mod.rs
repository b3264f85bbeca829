//! Operation library
//!
//! Every operation is a pure function with the [`OperationFn`] signature and
//! registers itself with the catalog through `inventory`.
//!
//! [`OperationFn`]: crate::descriptor::OperationFn

pub mod bbox;
pub mod buffer;
pub mod centroid;
pub mod dissolve;
pub mod filter;
pub mod make_valid;
pub mod measure;
pub mod overlay;
pub mod reproject;
pub mod simplify;
pub mod smooth;

use crate::error::{OperationError, Result};
use crate::model::FeatureCollection;

/// Unwrap a required secondary collection
pub(crate) fn require_secondary<'a>(
    secondary: Option<&'a FeatureCollection>,
    port: &str,
) -> Result<&'a FeatureCollection> {
    secondary.ok_or_else(|| OperationError::MissingInput(port.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use geo_types::{polygon, Polygon};
    use serde_json::Value;

    use crate::model::{ConfigMap, Feature, Properties};

    /// Axis-aligned square with lower-left corner at (x, y)
    pub fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
            (x: x, y: y),
        ]
    }

    pub fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap_or_default()
    }

    pub fn config(value: Value) -> ConfigMap {
        props(value)
    }

    pub fn feature(geometry: impl Into<geo_types::Geometry<f64>>, value: Value) -> Feature {
        Feature::with_properties(geometry, props(value))
    }
}
