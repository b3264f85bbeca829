//! Error types for the execution engine

use geoflow_ops::{FormatError, OperationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using GeoflowError
pub type Result<T> = std::result::Result<T, GeoflowError>;

/// Errors that can occur while editing or running a graph
#[derive(Debug, Error)]
pub enum GeoflowError {
    /// Missing or invalid configuration (no file uploaded, no URL, bad value)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A required input port is unbound or its upstream has no result
    #[error("Missing input on port '{port}' of node '{node_id}'")]
    MissingInput { node_id: String, port: String },

    /// Malformed GeoJSON/CSV/WKT
    #[error("Parse error: {0}")]
    Parse(String),

    /// A geometry computation rejected its input
    #[error("Operation failed: {0}")]
    Operation(String),

    /// Fetch failure or non-2xx response
    #[error("Network error: {0}")]
    Network(String),

    /// Script threw, timed out, or returned the wrong shape
    #[error("Script error: {0}")]
    ScriptContract(String),

    /// The graph would contain a cycle through this node
    #[error("Graph contains a cycle through node '{node_id}'")]
    CyclicGraph { node_id: String },

    /// An edge references a node that does not exist
    #[error("Edge references unknown node '{node_id}'")]
    DanglingEdge { node_id: String },

    /// File extension or export format not recognised
    #[error("Unsupported file format '{extension}'")]
    UnsupportedFormat { extension: String },

    /// No node with this id
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// No edge with this id
    #[error("Unknown edge: {0}")]
    UnknownEdge(String),

    /// No handler registered for this operation type
    #[error("Unknown operation type: {0}")]
    UnknownOperation(String),

    /// Port name does not exist on the operation
    #[error("Operation '{operation_type}' has no {direction} port '{port}'")]
    InvalidPort {
        operation_type: String,
        direction: PortDirection,
        port: String,
    },

    /// The target input port already has an incoming edge
    #[error("Input port '{port}' of node '{node_id}' is already connected")]
    PortAlreadyBound { node_id: String, port: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Side of a node a port belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PortDirection {
    Input,
    Output,
}

impl std::fmt::Display for PortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Error taxonomy surfaced to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    Parse,
    Operation,
    Network,
    ScriptContract,
    CyclicGraph,
    DanglingEdge,
    UnsupportedFormat,
}

impl GeoflowError {
    /// Create a validation error with a message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a network error with a message
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a script contract error with a message
    pub fn script(msg: impl Into<String>) -> Self {
        Self::ScriptContract(msg.into())
    }

    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::MissingInput { .. }
            | Self::UnknownNode(_)
            | Self::UnknownEdge(_)
            | Self::UnknownOperation(_)
            | Self::InvalidPort { .. }
            | Self::PortAlreadyBound { .. } => ErrorKind::Validation,
            Self::Parse(_) | Self::Serialization(_) => ErrorKind::Parse,
            Self::Operation(_) | Self::Compression(_) | Self::Io(_) => ErrorKind::Operation,
            Self::Network(_) => ErrorKind::Network,
            Self::ScriptContract(_) => ErrorKind::ScriptContract,
            Self::CyclicGraph { .. } => ErrorKind::CyclicGraph,
            Self::DanglingEdge { .. } => ErrorKind::DanglingEdge,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
        }
    }
}

impl From<OperationError> for GeoflowError {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::InvalidConfig(msg) => Self::Validation(msg),
            OperationError::MissingInput(port) => Self::Validation(format!(
                "missing required input on port '{port}'"
            )),
            OperationError::Geometry(msg) => Self::Operation(msg),
        }
    }
}

impl From<FormatError> for GeoflowError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::UnsupportedFormat { extension } => Self::UnsupportedFormat { extension },
            FormatError::Encode { .. } => Self::Operation(err.to_string()),
            FormatError::Parse { .. } => Self::Parse(err.to_string()),
        }
    }
}
