//! Error types for csvflux-core

use thiserror::Error;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid timestamp: {0} (must be non-negative nanoseconds)")]
    InvalidTimestamp(i64),

    #[error("Missing timestamp")]
    MissingTimestamp,

    #[error("Empty measurement name")]
    EmptyMeasurement,

    #[error("Empty tag key")]
    EmptyTagKey,

    #[error("Empty field key")]
    EmptyFieldKey,

    #[error("No fields provided")]
    NoFields,
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
