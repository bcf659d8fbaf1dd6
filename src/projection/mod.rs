//! Record projection: raw nested records → server- or API-stage structures.
//!
//! ```text
//!   raw record ──extract──▶ database stage ──augment──▶ database stage
//!                                                          │
//!                                   ┌──────────────────────┴───────┐
//!                                   ▼                              ▼
//!                             server stage                     API stage
//! ```
//!
//! Both stages are converted from the same extracted record, so they carry
//! the same keys with the same omission and null semantics.

mod hooks;
mod projector;
mod record;
mod stage;

pub use hooks::{Augmenter, DerivedFieldHook, DerivedFields};
pub use projector::RecordProjector;
pub use record::{record_to_json, write_record, Projected, Record};
pub use stage::{ApiStage, ServerStage, Stage};

use thiserror::Error;

use crate::types::{CatalogError, DataTypeError};

/// Errors raised while projecting records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Derived field '{owner}.{field}' has no hook")]
    UnhandledDerivedField { owner: String, field: String },

    #[error("Derived field '{owner}.{field}' failed: {message}")]
    Hook {
        owner: String,
        field: String,
        message: String,
    },

    #[error("Cannot resolve the branch of '{field}'")]
    Discriminator {
        field: String,
        #[source]
        source: DataTypeError,
    },

    #[error("'{field}' has no '{discriminator}' discriminator")]
    MissingDiscriminator { field: String, discriminator: String },

    #[error("'{field}' has no branch '{value}'")]
    UnknownBranch { field: String, value: String },

    #[error("'{field}' should be {expected}, found {found}")]
    ShapeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Cannot convert '{field}'")]
    Conversion {
        field: String,
        #[source]
        source: DataTypeError,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ProjectionError {
    /// Errors caused by a schema or wiring mismatch rather than by data.
    pub fn is_programming_error(&self) -> bool {
        match self {
            ProjectionError::UnhandledDerivedField { .. } | ProjectionError::Catalog(_) => true,
            ProjectionError::Conversion { source, .. } => source.is_programming_error(),
            _ => false,
        }
    }
}

pub type ProjectionResult<T> = Result<T, ProjectionError>;
