//! In-memory feature data model
//!
//! A [`Feature`] pairs a `geo_types` geometry with a JSON property map.
//! A [`FeatureCollection`] is an ordered list of features; every operation
//! preserves that order.

use geo_types::Geometry;

/// Property map attached to each feature
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Per-node configuration map (string key to scalar/string value)
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// Coordinate reference label for all collections handled by the core
pub const DEFAULT_CRS: &str = "EPSG:4326";

/// One geometry plus its attribute properties
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub properties: Properties,
}

impl Feature {
    /// Create a feature with empty properties
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            properties: Properties::new(),
        }
    }

    /// Create a feature with the given properties
    pub fn with_properties(geometry: impl Into<Geometry<f64>>, properties: Properties) -> Self {
        Self {
            geometry: geometry.into(),
            properties,
        }
    }

    /// Replace the geometry, keeping the properties
    pub fn map_geometry(&self, geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            properties: self.properties.clone(),
        }
    }

    /// GeoJSON type label of this feature's geometry
    pub fn geometry_type(&self) -> &'static str {
        geometry_type_label(&self.geometry)
    }
}

/// An ordered group of features
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Summary label for the geometry types present
    ///
    /// Returns the shared type when all features agree, `"Mixed"` when they
    /// differ and `"Empty"` for an empty collection.
    pub fn geometry_type_summary(&self) -> String {
        let mut labels = self.features.iter().map(Feature::geometry_type);
        let Some(first) = labels.next() else {
            return "Empty".to_string();
        };
        if labels.all(|label| label == first) {
            first.to_string()
        } else {
            "Mixed".to_string()
        }
    }

    /// Geometry type labels of every feature, sorted (a multiset view)
    pub fn geometry_type_labels(&self) -> Vec<&'static str> {
        let mut labels: Vec<_> = self.features.iter().map(Feature::geometry_type).collect();
        labels.sort_unstable();
        labels
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

/// GeoJSON type label for a geometry
///
/// `geo_types`-only shapes map onto the GeoJSON type they serialize as.
pub fn geometry_type_label(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}
