//! csvflux Core - Point types shared by the exporter and its sinks
//!
//! This crate provides the data model that CSV rows are converted into:
//! - `Timestamp`: Nanosecond-precision Unix epoch timestamps
//! - `Tag`: Text key-value pair of a point
//! - `FieldValue`: Typed cell value (Float, Integer, String)
//! - `Field`: Named field with a value
//! - `Point`: One exported row with timestamp, tags, and fields

pub mod error;
pub mod types;

pub use error::{CoreError, Result};
pub use types::*;
