//! Object schema consumed by the selection and projection engine.
//!
//! The schema declares, per object type, its fields (with data type and
//! flags), its to-one relationships with their natural join columns, and its
//! collections. Representations are embedded sub-structures referenced from
//! fields typed `ref<Name>` or through a polymorphic type.

mod loader;
mod validation;

pub use loader::SchemaError;
pub use validation::{validate, SchemaIssue};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// The full schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Object types keyed by name.
    pub objects: BTreeMap<String, ObjectType>,
    /// Embedded representations keyed by name.
    pub representations: BTreeMap<String, Representation>,
    /// Enum tables keyed by enum name: a list of names or a code → name table.
    pub enums: BTreeMap<String, Json>,
    /// Polymorphic types keyed by name.
    pub polymorphic: BTreeMap<String, PolymorphicDef>,
}

impl Schema {
    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.objects.get(name)
    }

    pub fn representation(&self, name: &str) -> Option<&Representation> {
        self.representations.get(name)
    }
}

/// A persisted object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectType {
    /// Storage table.
    pub table: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
    #[serde(default)]
    pub collections: Vec<CollectionDef>,
}

impl ObjectType {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionDef> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Find any member by name.
    pub fn member(&self, name: &str) -> Option<Member<'_>> {
        self.field(name)
            .map(Member::Field)
            .or_else(|| self.relationship(name).map(Member::Relationship))
            .or_else(|| self.collection(name).map(Member::Collection))
    }
}

/// A member of an object type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Member<'a> {
    Field(&'a FieldDef),
    Relationship(&'a RelationshipDef),
    Collection(&'a CollectionDef),
}

/// An embedded sub-structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl Representation {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// Type expression resolved through the catalog.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Storage column, when it differs from the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Columns a derived field is computed from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(flatten)]
    pub flags: FieldFlags,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            column: None,
            depends_on: Vec::new(),
            flags: FieldFlags::default(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn derived(mut self, depends_on: Vec<&str>) -> Self {
        self.flags.derived = true;
        self.depends_on = depends_on.into_iter().map(String::from).collect();
        self
    }

    pub fn bulk_loaded(mut self) -> Self {
        self.flags.bulk_loaded = true;
        self
    }

    pub fn custom(mut self) -> Self {
        self.flags.custom = true;
        self
    }

    /// Storage name read from raw records.
    pub fn storage_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }
}

/// Field flags. All default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldFlags {
    pub custom: bool,
    pub derived: bool,
    pub bulk_loaded: bool,
    pub queryable: bool,
    pub filterable: bool,
    pub sortable: bool,
    pub required: bool,
}

/// A to-one relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipDef {
    pub name: String,
    /// Target object type.
    pub target: String,
    /// Natural join condition.
    pub join: JoinColumns,
    /// Populated out of band rather than by the primary fetch.
    #[serde(default)]
    pub bulk_loaded: bool,
}

impl RelationshipDef {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        parent_column: impl Into<String>,
        child_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            join: JoinColumns {
                parent: parent_column.into(),
                child: child_column.into(),
            },
            bulk_loaded: false,
        }
    }
}

/// Equality between a parent column and a child column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumns {
    pub parent: String,
    pub child: String,
}

/// A collection member. Collections are never part of the primary fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDef {
    pub name: String,
    pub item: CollectionItem,
}

impl CollectionDef {
    pub fn new(name: impl Into<String>, item: CollectionItem) -> Self {
        Self {
            name: name.into(),
            item,
        }
    }
}

/// Shape of each collection item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectionItem {
    /// Scalars of one data type.
    Scalar {
        #[serde(rename = "type")]
        data_type: String,
    },
    /// Related objects of a target type.
    Object { target: String },
    /// Embedded representations.
    Representation { representation: String },
}

/// A polymorphic type: a discriminator field selects the representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolymorphicDef {
    pub discriminator: String,
    /// Discriminator value → representation name.
    pub branches: BTreeMap<String, String>,
}
