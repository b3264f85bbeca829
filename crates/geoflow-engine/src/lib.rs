//! Geoflow Engine - dependency-ordered execution of geospatial operation graphs
//!
//! This crate is the execution core behind a node-graph editor. It provides:
//!
//! - A validated graph store (no dangling edges, explicit port bindings, no cycles)
//! - A dependency resolver producing a sequential execution order
//! - A per-node state machine (`idle -> running -> success | error`)
//! - A Result Store caching each node's last successful output
//! - A registry mapping operation types to handlers
//! - A sandboxed JavaScript runtime for custom script nodes
//! - Compressed snapshot-based undo/redo
//!
//! # Example
//!
//! ```ignore
//! use geoflow_engine::{Engine, Position};
//!
//! let mut engine = Engine::default();
//! let input = engine.create_node("file-input", Position::default())?;
//! let buffer = engine.create_node("buffer", Position::default())?;
//! engine.create_edge(&input.id, "output", &buffer.id, "input")?;
//! engine.upload(&input.id, "parcels.geojson", bytes)?;
//!
//! let report = engine.run_all().await?;
//! let buffered = engine.get_result(&buffer.id);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod history;
pub mod registry;
pub mod resolver;
pub mod sandbox;
pub mod sources;
pub mod store;
pub mod types;

// Re-export key types
pub use config::{EngineConfig, SandboxConfig};
pub use engine::{Engine, EngineBuilder, RunReport};
pub use error::{ErrorKind, GeoflowError, PortDirection, Result};
pub use events::{
    ChannelEventSink, EngineEvent, EventError, EventSink, NodeFailure, NullEventSink, VecEventSink,
};
pub use export::ExportArtifact;
pub use history::GraphHistory;
pub use registry::{
    ExecutionResources, OperationHandler, OperationOutput, OperationRegistry, OperationRequest,
    Upload,
};
pub use resolver::resolve;
pub use sandbox::ScriptSandbox;
pub use store::ResultStore;
pub use types::{Edge, EdgeId, Graph, Node, NodeId, NodePreview, NodeState, Position};

// Re-export the data model consumers need
pub use geoflow_ops::{ConfigMap, Feature, FeatureCollection, OperationDescriptor};
