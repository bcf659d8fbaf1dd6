//! Fetch planning: selection tree → alias-qualified LEFT JOIN plan.
//!
//! 1. Build a [`FetchNode`] tree (fields per node, one child per relationship)
//! 2. Walk it depth-first, allocating aliases with an [`AliasAllocator`]
//! 3. Emit a [`FetchPlan`] for the storage layer
//!
//! The planner knows tables and columns only. Data types play no part here.

mod alias;
mod plan;
mod tree;

pub use alias::{AliasAllocator, AliasOptions};
pub use plan::{ColumnRef, Condition, FetchPlan, Join, JoinType, TableRef, Term};
pub use tree::{CompareOp, FetchChild, FetchNode, JoinLink, Operand, Predicate};

use thiserror::Error;

/// Errors that can occur during planning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Relationship '{0}' was never added to this node")]
    UnknownRelationship(String),

    #[error("Relationship name is empty")]
    EmptyRelationshipName,

    #[error("No free alias for relationship '{relationship}' below '{parent}'")]
    AliasExhausted {
        parent: String,
        relationship: String,
    },
}

pub type PlanResult<T> = Result<T, PlanError>;
