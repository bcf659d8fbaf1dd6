//! Data type error channels.
//!
//! Validation failures and conversion failures travel on separate channels:
//! a [`ValidationError`] is a user-facing message, while a [`DataTypeError`]
//! carries an internal diagnostic that must not reach the caller verbatim.

use std::fmt;
use thiserror::Error;

/// Result type for conversions.
pub type ConversionResult<T> = Result<T, DataTypeError>;

/// Outcome of validating a user value.
pub type Validation = Result<(), ValidationError>;

/// A user input that did not pass validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Prefix the message with the position of an offending item.
    pub fn at(self, position: impl fmt::Display) -> Self {
        Self {
            message: format!("item {}: {}", position, self.message),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while converting between value stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataTypeError {
    /// A value did not have the shape the type expects. The message is an
    /// internal diagnostic and may contain raw stored data.
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// The type is configured in a way that cannot produce a value.
    #[error("data type misconfigured: {0}")]
    Configuration(String),

    /// The operation is not defined for this type.
    #[error("{type_name} does not support {operation}")]
    Unsupported {
        type_name: String,
        operation: &'static str,
    },
}

impl DataTypeError {
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn unsupported(type_name: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            type_name: type_name.into(),
            operation,
        }
    }

    /// Whether the error signals drift between schema and implementation
    /// rather than bad data.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

impl From<ValidationError> for DataTypeError {
    fn from(err: ValidationError) -> Self {
        Self::Conversion(err.message)
    }
}

/// Errors raised while assembling the data type catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("unknown data type: {0}")]
    UnknownType(String),

    #[error("malformed type expression '{expr}': {reason}")]
    MalformedExpression { expr: String, reason: String },

    #[error("data type '{0}' is registered twice")]
    DuplicateType(String),

    #[error("enum '{name}' rejected: {reason}")]
    InvalidEnum { name: String, reason: String },

    #[error("data type '{name}' rejected: {source}")]
    InvalidType {
        name: String,
        #[source]
        source: DataTypeError,
    },
}
