//! Operation registry for handler dispatch
//!
//! Maps operation type strings to a descriptor and a handler. Adding an
//! operation means registering one handler; the engine never matches on
//! type names.
//!
//! # Usage
//!
//! ```ignore
//! use geoflow_engine::OperationRegistry;
//!
//! let mut registry = OperationRegistry::with_builtins();
//! registry.register_fn(my_descriptor(), |input, config, _| Ok(input.clone()));
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use geoflow_ops::{
    builtin_entries, ConfigMap, FeatureCollection, OperationDescriptor, OperationEntry,
    OperationFn,
};

use crate::error::{GeoflowError, Result};
use crate::export::{ExportArtifact, ExportHandler};
use crate::sandbox::{CustomScriptHandler, ScriptSandbox};
use crate::sources::{FileInputHandler, UrlInputHandler};
use crate::types::NodeId;

/// Bytes handed to a file source node
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Everything a handler needs for one node run
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub node_id: NodeId,
    pub config: ConfigMap,
    /// Result bound to the `input` port
    pub primary: Option<Arc<FeatureCollection>>,
    /// Result bound to the secondary port, if the operation has one
    pub secondary: Option<Arc<FeatureCollection>>,
    /// Uploaded bytes for file sources
    pub upload: Option<Upload>,
}

impl OperationRequest {
    /// The primary input, or a `MissingInput` error for this node
    pub fn require_primary(&self) -> Result<&Arc<FeatureCollection>> {
        self.primary.as_ref().ok_or_else(|| GeoflowError::MissingInput {
            node_id: self.node_id.clone(),
            port: geoflow_ops::ports::INPUT.to_string(),
        })
    }
}

/// Engine-scoped collaborators shared by every handler
#[derive(Debug, Clone)]
pub struct ExecutionResources {
    pub http: reqwest::Client,
    pub http_timeout: Option<Duration>,
    pub sandbox: ScriptSandbox,
}

/// What a successful run produces
#[derive(Debug, Clone)]
pub struct OperationOutput {
    pub collection: Arc<FeatureCollection>,
    /// File written by `export` nodes
    pub artifact: Option<ExportArtifact>,
}

impl OperationOutput {
    pub fn collection(collection: impl Into<Arc<FeatureCollection>>) -> Self {
        Self {
            collection: collection.into(),
            artifact: None,
        }
    }
}

/// Per-operation-type handler
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Run this operation for one node
    async fn execute(
        &self,
        request: OperationRequest,
        resources: &ExecutionResources,
    ) -> Result<OperationOutput>;
}

/// Adapts a pure library function to [`OperationHandler`]
pub struct TransformHandler {
    apply: OperationFn,
}

impl TransformHandler {
    pub fn new(apply: OperationFn) -> Self {
        Self { apply }
    }
}

#[async_trait]
impl OperationHandler for TransformHandler {
    async fn execute(
        &self,
        request: OperationRequest,
        _resources: &ExecutionResources,
    ) -> Result<OperationOutput> {
        let primary: &FeatureCollection = request.require_primary()?;
        let output = (self.apply)(primary, &request.config, request.secondary.as_deref())?;
        Ok(OperationOutput::collection(output))
    }
}

type TransformClosure = dyn Fn(
        &FeatureCollection,
        &ConfigMap,
        Option<&FeatureCollection>,
    ) -> geoflow_ops::Result<FeatureCollection>
    + Send
    + Sync;

/// Closure-backed handler, for operations registered at runtime
pub struct ClosureHandler {
    apply: Box<TransformClosure>,
}

#[async_trait]
impl OperationHandler for ClosureHandler {
    async fn execute(
        &self,
        request: OperationRequest,
        _resources: &ExecutionResources,
    ) -> Result<OperationOutput> {
        let primary: &FeatureCollection = request.require_primary()?;
        let output = (self.apply)(primary, &request.config, request.secondary.as_deref())?;
        Ok(OperationOutput::collection(output))
    }
}

struct RegistryEntry {
    descriptor: OperationDescriptor,
    handler: Arc<dyn OperationHandler>,
}

/// Registry of operation types with their descriptors and handlers
pub struct OperationRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl OperationRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry with every built-in operation
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for entry in builtin_entries() {
            registry.register_entry(entry);
        }
        registry.register(crate::sources::file_input_descriptor(), Arc::new(FileInputHandler));
        registry.register(crate::sources::url_input_descriptor(), Arc::new(UrlInputHandler));
        registry.register(crate::sandbox::descriptor(), Arc::new(CustomScriptHandler));
        registry.register(crate::export::descriptor(), Arc::new(ExportHandler));
        registry
    }

    /// Register an operation type with its handler
    pub fn register(&mut self, descriptor: OperationDescriptor, handler: Arc<dyn OperationHandler>) {
        self.entries.insert(
            descriptor.operation_type.clone(),
            RegistryEntry {
                descriptor,
                handler,
            },
        );
    }

    /// Register a built-in library entry
    pub fn register_entry(&mut self, entry: &OperationEntry) {
        self.register(
            (entry.descriptor)(),
            Arc::new(TransformHandler::new(entry.apply)),
        );
    }

    /// Register an operation backed by a plain closure
    pub fn register_fn<F>(&mut self, descriptor: OperationDescriptor, apply: F)
    where
        F: Fn(
                &FeatureCollection,
                &ConfigMap,
                Option<&FeatureCollection>,
            ) -> geoflow_ops::Result<FeatureCollection>
            + Send
            + Sync
            + 'static,
    {
        self.register(
            descriptor,
            Arc::new(ClosureHandler {
                apply: Box::new(apply),
            }),
        );
    }

    pub fn get_descriptor(&self, operation_type: &str) -> Option<&OperationDescriptor> {
        self.entries.get(operation_type).map(|e| &e.descriptor)
    }

    pub fn get_handler(&self, operation_type: &str) -> Option<Arc<dyn OperationHandler>> {
        self.entries.get(operation_type).map(|e| Arc::clone(&e.handler))
    }

    /// Descriptor for a type, or an `UnknownOperation` error
    pub fn descriptor_or_err(&self, operation_type: &str) -> Result<&OperationDescriptor> {
        self.get_descriptor(operation_type)
            .ok_or_else(|| GeoflowError::UnknownOperation(operation_type.to_string()))
    }

    /// Check if an operation type is registered
    pub fn has_operation(&self, operation_type: &str) -> bool {
        self.entries.contains_key(operation_type)
    }

    /// All descriptors, sorted by operation type
    pub fn descriptors(&self) -> Vec<&OperationDescriptor> {
        let mut all: Vec<_> = self.entries.values().map(|e| &e.descriptor).collect();
        all.sort_by(|a, b| a.operation_type.cmp(&b.operation_type));
        all
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` with the same type.
    pub fn merge(&mut self, other: OperationRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoflow_ops::{OperationCategory, PortSpec};

    fn passthrough_descriptor(id: &str) -> OperationDescriptor {
        OperationDescriptor::new(id, OperationCategory::Transform, "Pass", "Returns its input")
            .with_input(PortSpec::required(geoflow_ops::ports::INPUT, "Input"))
    }

    #[test]
    fn test_builtins_cover_the_catalog() {
        let registry = OperationRegistry::with_builtins();
        for id in [
            "file-input", "url-input", "buffer", "simplify", "centroid", "bbox", "dissolve",
            "intersect", "union", "clip", "area", "distance", "filter", "smooth", "make-valid",
            "reproject", "custom-script", "export",
        ] {
            assert!(registry.has_operation(id), "missing {id}");
        }
        assert!(registry.get_descriptor("file-input").unwrap().is_source());
        assert!(registry.get_descriptor("nope").is_none());
    }

    #[test]
    fn test_descriptors_are_sorted() {
        let registry = OperationRegistry::with_builtins();
        let types: Vec<_> = registry
            .descriptors()
            .into_iter()
            .map(|d| d.operation_type.clone())
            .collect();
        let mut sorted = types.clone();
        sorted.sort();
        assert_eq!(types, sorted);
    }

    #[test]
    fn test_merge_overrides() {
        let mut registry = OperationRegistry::new();
        registry.register_fn(passthrough_descriptor("pass"), |input, _, _| Ok(input.clone()));

        let mut other = OperationRegistry::new();
        let mut replacement = passthrough_descriptor("pass");
        replacement.label = "Replaced".to_string();
        other.register_fn(replacement, |_, _, _| Ok(FeatureCollection::default()));
        registry.merge(other);

        assert_eq!(registry.get_descriptor("pass").unwrap().label, "Replaced");
        assert!(matches!(
            registry.descriptor_or_err("missing"),
            Err(GeoflowError::UnknownOperation(_))
        ));
    }
}
