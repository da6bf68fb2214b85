//! Error types for the bridge core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Payload length does not match the declared value type and count
    #[error("invalid payload: {value_count} x {value_type} needs {expected} bytes, got {actual}")]
    InvalidPayload {
        value_type: crate::ValueType,
        value_count: u16,
        expected: usize,
        actual: usize,
    },

    /// Payload accessed as the wrong value type
    #[error("value type mismatch: expected {expected}, payload holds {actual}")]
    TypeMismatch {
        expected: crate::ValueType,
        actual: crate::ValueType,
    },

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field required by the selected mode or protocol type is absent
    #[error("{context}: missing required field `{field}`")]
    MissingField { context: String, field: &'static str },

    /// A field is present but holds an unusable value
    #[error("{context}: invalid value for `{field}`: {reason}")]
    InvalidValue {
        context: String,
        field: &'static str,
        reason: String,
    },

    /// The same id appears twice where ids must be unique
    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: u32 },

    /// The object cannot be used in this position (e.g. polled without addressing)
    #[error("{context}: object {object} is not supported here")]
    UnsupportedObject { context: String, object: String },
}

impl ConfigError {
    pub fn missing(context: impl Into<String>, field: &'static str) -> Self {
        ConfigError::MissingField {
            context: context.into(),
            field,
        }
    }

    pub fn invalid(context: impl Into<String>, field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            context: context.into(),
            field,
            reason: reason.into(),
        }
    }
}
