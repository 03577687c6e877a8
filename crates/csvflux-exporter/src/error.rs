//! Error types for the exporter

use thiserror::Error;

/// Hint appended to every fatal write diagnostic
pub const FORCE_TYPE_HINT: &str = "If you would like to force a column to a target data type, use: \
     --force-string-columns, --force-int-columns or --force-float-columns";

/// Exporter errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Point error: {0}")]
    Point(#[from] csvflux_core::CoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected time with format: {value}, {format}")]
    Timestamp { value: String, format: String },

    #[error("Data type conflict reported by the sink. Please double check the csv data. {hint}. Details: {details}", hint = FORCE_TYPE_HINT)]
    TypeConflict { details: String },

    #[error("Problem inserting points: {message}. {hint}", hint = FORCE_TYPE_HINT)]
    WriteRejected { message: String },

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },
}

/// Result type for exporter operations
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_errors_suggest_force_overrides() {
        let conflict = ExportError::TypeConflict {
            details: "field type conflict: input field \"value\"".into(),
        };
        let message = conflict.to_string();
        assert!(message.contains("--force-string-columns"));
        assert!(message.contains("--force-int-columns"));
        assert!(message.contains("--force-float-columns"));
        assert!(message.contains("input field"));

        let rejected = ExportError::WriteRejected {
            message: "batch failed".into(),
        };
        assert!(rejected.to_string().contains("--force-float-columns"));
    }

    #[test]
    fn test_timestamp_error_names_value_and_format() {
        let err = ExportError::Timestamp {
            value: "yesterday".into(),
            format: "%Y-%m-%d".into(),
        };
        assert_eq!(
            err.to_string(),
            "Unexpected time with format: yesterday, %Y-%m-%d"
        );
    }
}
