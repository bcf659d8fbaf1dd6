//! Selections: which fields, relationships and collections a request asks for.
//!
//! A [`SelectionSet`] is built once per request from dotted paths
//! (`"owner.name"`) against the schema and is immutable afterwards. The same
//! set drives both the fetch plan and the record projection.

mod builder;
mod fetch;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::planner::PlanError;
use crate::schema::{CollectionDef, FieldDef, RelationshipDef};

/// Errors raised while building selections.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectionError {
    #[error("Unknown object type '{0}'")]
    UnknownObject(String),

    #[error("Unknown representation '{0}'")]
    UnknownRepresentation(String),

    #[error("'{owner}' has no member '{member}'")]
    UnknownMember { owner: String, member: String },

    #[error("'{owner}.{member}' is a scalar and cannot be traversed")]
    NotTraversable { owner: String, member: String },

    #[error("Invalid selection path '{0}'")]
    InvalidPath(String),

    #[error("Representation nesting below '{0}' is too deep")]
    TooDeep(String),

    #[error("'{0}' is not an object type and has no table to fetch from")]
    NotAnObject(String),

    #[error(transparent)]
    Plan(#[from] PlanError),
}

pub type SelectionResult<T> = Result<T, SelectionError>;

/// One requested member.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Read directly from storage.
    Field(FieldDef),
    /// Computed by a derived-field hook.
    Derived(FieldDef),
    /// Populated out of band: bulk-loaded or custom fields.
    BulkLoaded(FieldDef),
    /// A to-one related object.
    Relationship {
        def: RelationshipDef,
        /// Table of the target object.
        table: String,
        selections: SelectionSet,
    },
    /// Never part of the primary fetch; filled in by augmentation.
    Collection {
        def: CollectionDef,
        items: CollectionSelection,
    },
    /// An embedded sub-structure stored in one column.
    Representation {
        field: FieldDef,
        target: RepresentationSelection,
    },
}

impl Selection {
    /// Output key of this selection.
    pub fn name(&self) -> &str {
        match self {
            Selection::Field(f) | Selection::Derived(f) | Selection::BulkLoaded(f) => &f.name,
            Selection::Relationship { def, .. } => &def.name,
            Selection::Collection { def, .. } => &def.name,
            Selection::Representation { field, .. } => &field.name,
        }
    }
}

/// Item shape of a selected collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionSelection {
    Scalar { data_type: String },
    Object(SelectionSet),
    Representation(SelectionSet),
}

/// What a representation field resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum RepresentationSelection {
    Fixed(SelectionSet),
    /// Branch chosen per record by the discriminator value.
    Polymorphic {
        type_name: String,
        discriminator: String,
        branches: BTreeMap<String, SelectionSet>,
    },
}

/// Whether a set belongs to a stored object or an embedded representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Object { name: String, table: String },
    Representation { name: String },
}

/// Ordered, duplicate-free selections for one object or representation.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSet {
    owner: Owner,
    entries: Vec<Selection>,
}

impl SelectionSet {
    pub fn new(owner: Owner) -> Self {
        Self {
            owner,
            entries: Vec::new(),
        }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Name of the owning object type or representation.
    pub fn owner_name(&self) -> &str {
        match &self.owner {
            Owner::Object { name, .. } | Owner::Representation { name } => name,
        }
    }

    /// Storage table, for object-owned sets.
    pub fn table(&self) -> Option<&str> {
        match &self.owner {
            Owner::Object { table, .. } => Some(table),
            Owner::Representation { .. } => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Selection> {
        self.entries.iter().find(|s| s.name() == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Selection> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(Selection::name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Selection> {
        self.entries.iter_mut().find(|s| s.name() == name)
    }

    fn push(&mut self, selection: Selection) -> &mut Selection {
        self.entries.push(selection);
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }
}

impl<'a> IntoIterator for &'a SelectionSet {
    type Item = &'a Selection;
    type IntoIter = std::slice::Iter<'a, Selection>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
