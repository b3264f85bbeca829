//! Operation descriptors and the built-in operation catalog
//!
//! Each operation describes itself with an [`OperationDescriptor`]: its
//! identifier, input/output ports and default configuration. Descriptors are
//! pure data; behaviour is attached separately through [`OperationEntry`].
//!
//! Built-in operations submit an entry next to their implementation:
//!
//! ```ignore
//! inventory::submit! {
//!     OperationEntry { descriptor: descriptor, apply: apply }
//! }
//! ```
//!
//! and [`builtin_entries`] collects them at link time.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{ConfigMap, FeatureCollection};

/// Well-known port identifiers
pub mod ports {
    /// Primary input of every non-source operation
    pub const INPUT: &str = "input";
    /// Single output of every operation
    pub const OUTPUT: &str = "output";
    /// Secondary input of `intersect`
    pub const OVERLAY: &str = "overlay";
    /// Secondary input of `union`
    pub const OTHER: &str = "other";
    /// Mask input of `clip`
    pub const MASK: &str = "mask";
    /// Target input of `distance`
    pub const TARGETS: &str = "targets";
}

/// Category of an operation, used for palette grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    /// Produces data from outside the graph (files, URLs)
    Source,
    /// Reshapes each feature's geometry or filters features
    Transform,
    /// Combines two collections
    Overlay,
    /// Attaches computed measurements as properties
    Measure,
    /// User-supplied script
    Script,
    /// Writes a collection out as a file
    Output,
}

/// Metadata for a port (input or output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    /// Port identifier, referenced by edges
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Whether the engine refuses to run the node while this port is unbound
    pub required: bool,
}

impl PortSpec {
    /// Create a required port
    pub fn required(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            required: true,
        }
    }

    /// Create an optional port
    pub fn optional(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            required: false,
        }
    }
}

/// Complete metadata for an operation type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    /// Unique type identifier (e.g., "buffer")
    pub operation_type: String,
    /// Category for UI grouping
    pub category: OperationCategory,
    /// Human-readable label
    pub label: String,
    /// Description of what the operation does
    pub description: String,
    /// Input port definitions; empty for source operations
    pub inputs: Vec<PortSpec>,
    /// Output port definitions
    pub outputs: Vec<PortSpec>,
    /// Configuration a freshly created node starts with
    pub default_config: ConfigMap,
}

impl OperationDescriptor {
    /// Start a descriptor with the standard single `output` port
    pub fn new(
        operation_type: impl Into<String>,
        category: OperationCategory,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            operation_type: operation_type.into(),
            category,
            label: label.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: vec![PortSpec::optional(ports::OUTPUT, "Output")],
            default_config: ConfigMap::new(),
        }
    }

    /// Add an input port
    pub fn with_input(mut self, port: PortSpec) -> Self {
        self.inputs.push(port);
        self
    }

    /// Set the default configuration from a serializable config struct
    pub fn with_defaults<T: Serialize>(mut self, defaults: &T) -> Self {
        if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(defaults) {
            self.default_config = map;
        }
        self
    }

    /// True for operations without inputs
    pub fn is_source(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Find an input port by id
    pub fn input(&self, port_id: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.id == port_id)
    }

    /// Find an output port by id
    pub fn output(&self, port_id: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.id == port_id)
    }

    /// The secondary input port, if the operation has one
    pub fn secondary_input(&self) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.id != ports::INPUT)
    }
}

/// Uniform signature of a pure library operation
pub type OperationFn =
    fn(&FeatureCollection, &ConfigMap, Option<&FeatureCollection>) -> Result<FeatureCollection>;

/// A built-in operation: its descriptor paired with its implementation
pub struct OperationEntry {
    pub descriptor: fn() -> OperationDescriptor,
    pub apply: OperationFn,
}

inventory::collect!(OperationEntry);

/// All built-in library operations, sorted by operation type
pub fn builtin_entries() -> Vec<&'static OperationEntry> {
    let mut entries: Vec<_> = inventory::iter::<OperationEntry>.into_iter().collect();
    entries.sort_by_key(|e| (e.descriptor)().operation_type);
    entries
}

/// Descriptors of all built-in library operations
pub fn catalog() -> Vec<OperationDescriptor> {
    builtin_entries()
        .into_iter()
        .map(|e| (e.descriptor)())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_spec_required() {
        let port = PortSpec::required("input", "Input");
        assert_eq!(port.id, "input");
        assert!(port.required);
        assert!(!PortSpec::optional("other", "Other").required);
    }

    #[test]
    fn test_descriptor_serialization() {
        let descriptor = OperationDescriptor::new(
            "test-op",
            OperationCategory::Transform,
            "Test",
            "A test operation",
        )
        .with_input(PortSpec::required(ports::INPUT, "Input"));

        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("test-op"));
        assert!(json.contains("operationType")); // camelCase
        assert!(!descriptor.is_source());
        assert!(descriptor.secondary_input().is_none());
    }

    #[test]
    fn test_catalog_lists_library_operations() {
        let types: Vec<String> = catalog().into_iter().map(|d| d.operation_type).collect();
        for expected in [
            "area", "bbox", "buffer", "centroid", "clip", "dissolve", "distance", "filter",
            "intersect", "make-valid", "reproject", "simplify", "smooth", "union",
        ] {
            assert!(types.iter().any(|t| t == expected), "missing {expected}");
        }
        let mut sorted = types.clone();
        sorted.sort();
        assert_eq!(types, sorted);
    }

    #[test]
    fn test_binary_operations_name_their_secondary_port() {
        let catalog = catalog();
        let find = |id: &str| catalog.iter().find(|d| d.operation_type == id).unwrap();
        assert_eq!(find("intersect").secondary_input().unwrap().id, ports::OVERLAY);
        assert_eq!(find("clip").secondary_input().unwrap().id, ports::MASK);
        assert_eq!(find("distance").secondary_input().unwrap().id, ports::TARGETS);
        assert!(!find("union").secondary_input().unwrap().required);
    }
}
