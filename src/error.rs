//! Crate-level error and the boundary mapping to user-facing messages.
//!
//! Validation failures are the caller's fault and are shown verbatim.
//! Conversion, programming and configuration failures carry internal
//! diagnostics; [`Error::user_message`] logs them and returns a generic text.

use thiserror::Error;

use crate::config::SettingsError;
use crate::context::ContextError;
use crate::planner::PlanError;
use crate::projection::ProjectionError;
use crate::schema::SchemaError;
use crate::selection::SelectionError;
use crate::types::{CatalogError, DataTypeError, ValidationError};

/// Generic text for failed conversions.
pub const CONVERSION_MESSAGE: &str = "The value could not be processed.";
/// Generic text for internal faults.
pub const INTERNAL_MESSAGE: &str = "An internal error occurred.";

/// Which channel an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad user input. Safe to show.
    Validation,
    /// An internal invariant failed on real data.
    Conversion,
    /// Schema or implementation drift. Never retried.
    Programming,
    /// Bad settings, schema or catalog, detected at startup.
    Configuration,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    DataType(#[from] DataTypeError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

pub type Result<T> = std::result::Result<T, Error>;

fn data_type_kind(error: &DataTypeError) -> ErrorKind {
    match error {
        DataTypeError::Conversion(_) => ErrorKind::Conversion,
        DataTypeError::Configuration(_) => ErrorKind::Configuration,
        DataTypeError::Unsupported { .. } => ErrorKind::Programming,
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::DataType(e) => data_type_kind(e),
            Error::Selection(SelectionError::Plan(_)) | Error::Plan(_) => ErrorKind::Programming,
            Error::Selection(SelectionError::TooDeep(_)) => ErrorKind::Configuration,
            Error::Selection(_) => ErrorKind::Validation,
            Error::Projection(e) => match e {
                ProjectionError::Conversion { source, .. }
                | ProjectionError::Discriminator { source, .. } => data_type_kind(source),
                e if e.is_programming_error() => ErrorKind::Programming,
                ProjectionError::Hook { .. } => ErrorKind::Programming,
                _ => ErrorKind::Conversion,
            },
            Error::Catalog(_) | Error::Context(_) | Error::Schema(_) | Error::Settings(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Text safe to return to a caller.
    ///
    /// Anything but a validation failure is logged with its diagnostic and
    /// replaced by a generic message.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation => self.to_string(),
            ErrorKind::Conversion => {
                tracing::warn!(error = %self, "conversion failed");
                CONVERSION_MESSAGE.to_string()
            }
            ErrorKind::Programming => {
                tracing::error!(error = %self, "programming error");
                INTERNAL_MESSAGE.to_string()
            }
            ErrorKind::Configuration => {
                tracing::error!(error = %self, "configuration error");
                INTERNAL_MESSAGE.to_string()
            }
        }
    }
}
