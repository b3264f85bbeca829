//! Typed operation configuration
//!
//! Node configuration arrives as a loose [`ConfigMap`]; each operation reads
//! it into its own typed struct with [`parse_config`]. Inspector forms often
//! send numbers and booleans as strings, so the `lenient` deserializers accept
//! both forms.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{OperationError, Result};
use crate::model::ConfigMap;

/// Read a typed config struct from a node's configuration map
pub fn parse_config<T: DeserializeOwned>(config: &ConfigMap) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(config.clone()))
        .map_err(|e| OperationError::config(e.to_string()))
}

/// Deserializers tolerant of stringly-typed form values
pub mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| D::Error::custom("number out of range")),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected a number, got '{s}'"))),
            other => Err(D::Error::custom(format!("expected a number, got {other}"))),
        }
    }

    pub fn usize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
        let value = f64(deserializer)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(D::Error::custom(format!(
                "expected a non-negative integer, got {value}"
            )));
        }
        Ok(value as usize)
    }

    pub fn bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(b) => Ok(b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" | "" => Ok(false),
                _ => Err(D::Error::custom(format!("expected a boolean, got '{s}'"))),
            },
            Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
            Value::Null => Ok(false),
            other => Err(D::Error::custom(format!("expected a boolean, got {other}"))),
        }
    }

    /// Optional string where an empty or blank value means "not set"
    pub fn opt_string<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }
}

/// Length units accepted by `buffer` and `distance`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthUnit {
    #[default]
    #[serde(alias = "meter", alias = "metres", alias = "m")]
    Meters,
    #[serde(alias = "kilometer", alias = "kilometres", alias = "km")]
    Kilometers,
    #[serde(alias = "mile", alias = "mi")]
    Miles,
    #[serde(alias = "foot", alias = "ft")]
    Feet,
}

impl LengthUnit {
    /// Meters in one unit
    pub fn meters_per_unit(self) -> f64 {
        match self {
            Self::Meters => 1.0,
            Self::Kilometers => 1000.0,
            Self::Miles => 1609.344,
            Self::Feet => 0.3048,
        }
    }

    pub fn to_meters(self, value: f64) -> f64 {
        value * self.meters_per_unit()
    }

    pub fn from_meters(self, meters: f64) -> f64 {
        meters / self.meters_per_unit()
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Meters => "meters",
            Self::Kilometers => "kilometers",
            Self::Miles => "miles",
            Self::Feet => "feet",
        }
    }
}

/// Area units accepted by `area`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AreaUnit {
    #[default]
    SquareMeters,
    SquareKilometers,
    SquareMiles,
    Hectares,
}

impl AreaUnit {
    /// Square meters in one unit
    pub fn square_meters_per_unit(self) -> f64 {
        match self {
            Self::SquareMeters => 1.0,
            Self::SquareKilometers => 1_000_000.0,
            Self::SquareMiles => 2_589_988.11,
            Self::Hectares => 10_000.0,
        }
    }

    pub fn from_square_meters(self, square_meters: f64) -> f64 {
        square_meters / self.square_meters_per_unit()
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SquareMeters => "square-meters",
            Self::SquareKilometers => "square-kilometers",
            Self::SquareMiles => "square-miles",
            Self::Hectares => "hectares",
        }
    }
}
