//! Error types for the entity synthesis engine
//!
//! Every failure the engine can report is a `SynthesisError`. Per-sample
//! failures are caught by the pipeline and turned into report entries, so
//! a `SynthesisError` escaping `transform` never aborts a batch.

use thiserror::Error;

use crate::sample::SampleKind;

pub type Result<T> = std::result::Result<T, SynthesisError>;

#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum SynthesisError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Classification error: {0}")]
    ClassificationError(String),

    #[error("Missing required field '{field}' on {kind} sample")]
    MissingFieldError {
        field: String,
        kind: SampleKind,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Transformation error: {0}")]
    TransformationError(String),

    #[error("Aggregation error: {0}")]
    AggregationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// Helper functions for creating specific errors
impl SynthesisError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SynthesisError::ConfigError(msg.into())
    }

    pub fn classification<S: Into<String>>(msg: S) -> Self {
        SynthesisError::ClassificationError(msg.into())
    }

    pub fn missing_field<S: Into<String>>(field: S, kind: SampleKind) -> Self {
        SynthesisError::MissingFieldError {
            field: field.into(),
            kind,
        }
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        SynthesisError::ValidationError(msg.into())
    }

    pub fn transformation<S: Into<String>>(msg: S) -> Self {
        SynthesisError::TransformationError(msg.into())
    }

    pub fn aggregation<S: Into<String>>(msg: S) -> Self {
        SynthesisError::AggregationError(msg.into())
    }

    /// Stable code used in report entries and CLI output
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ClassificationError(_) => "CLASSIFICATION_ERROR",
            Self::MissingFieldError { .. } => "MISSING_FIELD",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::TransformationError(_) => "TRANSFORMATION_ERROR",
            Self::AggregationError(_) => "AGGREGATION_ERROR",
            Self::SerializationError(_) => "SERIALIZATION_ERROR",
            Self::YamlError(_) => "YAML_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}
