//! Error types for operations and format adapters

use thiserror::Error;

/// Result type alias using OperationError
pub type Result<T> = std::result::Result<T, OperationError>;

/// Errors raised by the operation library
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OperationError {
    /// Configuration value missing or malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required input collection was not supplied
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// A geometry computation rejected its input
    #[error("Geometry operation failed: {0}")]
    Geometry(String),
}

impl OperationError {
    /// Create an invalid configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a geometry failure with a message
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }
}

/// Errors raised while reading or writing feature files
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FormatError {
    /// Input text could not be parsed
    #[error("Failed to parse {format}: {message}")]
    Parse { format: String, message: String },

    /// Collection could not be written in the requested format
    #[error("Failed to write {format}: {message}")]
    Encode { format: String, message: String },

    /// File extension or export format not recognised
    #[error("Unsupported file format '{extension}'")]
    UnsupportedFormat { extension: String },
}

impl FormatError {
    pub fn parse(format: &str, message: impl Into<String>) -> Self {
        Self::Parse {
            format: format.to_string(),
            message: message.into(),
        }
    }

    pub fn encode(format: &str, message: impl Into<String>) -> Self {
        Self::Encode {
            format: format.to_string(),
            message: message.into(),
        }
    }

    pub fn unsupported(extension: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            extension: extension.into(),
        }
    }
}
