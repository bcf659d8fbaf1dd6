//! # Strata
//!
//! Typed value conversion and selection/projection for a versioned object API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │             Schema (objects, fields, relationships)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [selection]
//! ┌─────────────────────────────────────────────────────────┐
//! │         SelectionSet (requested fields and paths)        │
//! └─────────────────────────────────────────────────────────┘
//!                │                              │
//!                ▼ [planner]                    │
//! ┌───────────────────────────────┐             │
//! │  FetchPlan (aliases, LEFT     │             │
//! │  JOINs) → storage layer       │             │
//! └───────────────────────────────┘             │
//!                │ raw nested records           │
//!                ▼                              ▼ [projection]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Record projection through DataTypes + context          │
//! │   → server-stage or API-stage structures                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod planner;
pub mod projection;
pub mod schema;
pub mod selection;
pub mod types;

pub use error::{Error, ErrorKind, Result};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::context::{ApiVersion, ConversionContext};
    pub use crate::planner::{AliasOptions, FetchNode, FetchPlan, JoinLink, Predicate};
    pub use crate::projection::{
        record_to_json, Augmenter, DerivedFields, Projected, Record, RecordProjector,
    };
    pub use crate::schema::Schema;
    pub use crate::selection::{Selection, SelectionSet};
    pub use crate::types::{
        DataType, DataTypeCatalog, JsonObjectWriter, ServerValue, ValidationError,
    };
    pub use crate::{Error, ErrorKind};
}
