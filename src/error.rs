//! Error types for the track-atlas pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for track-atlas operations
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum AtlasError {
    #[error("Input table not readable at {path}: {reason}")]
    MissingInput { path: PathBuf, reason: String },

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Not enough {what}: need at least {required}, got {actual}")]
    InsufficientData {
        what: String,
        required: usize,
        actual: usize,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}

impl AtlasError {
    /// True for the conditions that must abort a run before any output exists.
    pub fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            AtlasError::MissingInput { .. }
                | AtlasError::SchemaError(_)
                | AtlasError::EmptyData(_)
                | AtlasError::InsufficientData { .. }
        )
    }
}

impl From<polars::error::PolarsError> for AtlasError {
    fn from(err: polars::error::PolarsError) -> Self {
        AtlasError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AtlasError {
    fn from(err: ndarray::ShapeError) -> Self {
        AtlasError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
