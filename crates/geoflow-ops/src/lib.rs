//! Geoflow Ops - geometry operations and format adapters
//!
//! This crate is the pure half of geoflow. It has no I/O and no runtime:
//!
//! - [`model`]: features and feature collections over `geo_types`
//! - [`descriptor`]: the operation catalog (ports, categories, defaults)
//! - [`ops`]: one pure function per catalog entry
//! - [`formats`]: GeoJSON, CSV and WKT readers and writers
//! - [`expr`]: the property expression language used by `filter`
//!
//! # Example
//!
//! ```ignore
//! use geoflow_ops::{builtin_entries, formats};
//!
//! let input = formats::parse_bytes("parcels.geojson", &bytes)?;
//! let buffer = builtin_entries()
//!     .into_iter()
//!     .find(|e| (e.descriptor)().operation_type == "buffer")
//!     .unwrap();
//! let output = (buffer.apply)(&input, &config, None)?;
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod expr;
pub mod formats;
pub mod geometry;
pub mod model;
pub mod ops;

pub use descriptor::{
    builtin_entries, catalog, ports, OperationCategory, OperationDescriptor, OperationEntry,
    OperationFn, PortSpec,
};
pub use error::{FormatError, OperationError, Result};
pub use model::{ConfigMap, Feature, FeatureCollection, Properties, DEFAULT_CRS};
