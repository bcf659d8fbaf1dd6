//! Consistency checks between a schema and its catalog.

use std::collections::HashSet;
use std::fmt;

use super::{CollectionItem, FieldDef, Schema};
use crate::types::{DataTypeCatalog, TypeExpr};

/// A problem found in a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaIssue {
    /// A field or collection names a type the catalog does not know.
    UnknownType {
        owner: String,
        member: String,
        type_name: String,
    },
    /// A relationship or collection points at an undefined object type.
    UndefinedTarget {
        owner: String,
        member: String,
        target: String,
    },
    /// A reference names an undefined representation.
    UndefinedRepresentation {
        owner: String,
        member: String,
        representation: String,
    },
    /// Two members share a name.
    DuplicateMember { owner: String, name: String },
    /// A field's flags contradict each other.
    ConflictingFlags {
        owner: String,
        member: String,
        issue: String,
    },
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaIssue::UnknownType {
                owner,
                member,
                type_name,
            } => write!(f, "{}.{} has unknown type '{}'", owner, member, type_name),
            SchemaIssue::UndefinedTarget {
                owner,
                member,
                target,
            } => write!(f, "{}.{} targets undefined object '{}'", owner, member, target),
            SchemaIssue::UndefinedRepresentation {
                owner,
                member,
                representation,
            } => write!(
                f,
                "{}.{} references undefined representation '{}'",
                owner, member, representation
            ),
            SchemaIssue::DuplicateMember { owner, name } => {
                write!(f, "{} declares '{}' more than once", owner, name)
            }
            SchemaIssue::ConflictingFlags {
                owner,
                member,
                issue,
            } => write!(f, "{}.{}: {}", owner, member, issue),
        }
    }
}

impl std::error::Error for SchemaIssue {}

impl Schema {
    /// Check this schema against `catalog`, collecting every issue.
    pub fn validate(&self, catalog: &DataTypeCatalog) -> Result<(), Vec<SchemaIssue>> {
        validate(self, catalog)
    }
}

/// Validate a schema against its catalog.
pub fn validate(schema: &Schema, catalog: &DataTypeCatalog) -> Result<(), Vec<SchemaIssue>> {
    let mut issues = Vec::new();

    for (name, object) in &schema.objects {
        let members = object
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(object.relationships.iter().map(|r| r.name.as_str()))
            .chain(object.collections.iter().map(|c| c.name.as_str()));
        check_unique(name, members, &mut issues);

        for field in &object.fields {
            check_field(schema, catalog, name, field, &mut issues);
        }

        for rel in &object.relationships {
            if !schema.objects.contains_key(&rel.target) {
                issues.push(SchemaIssue::UndefinedTarget {
                    owner: name.clone(),
                    member: rel.name.clone(),
                    target: rel.target.clone(),
                });
            }
        }

        for collection in &object.collections {
            match &collection.item {
                CollectionItem::Scalar { data_type } => {
                    if !catalog.contains(data_type) {
                        issues.push(SchemaIssue::UnknownType {
                            owner: name.clone(),
                            member: collection.name.clone(),
                            type_name: data_type.clone(),
                        });
                    }
                }
                CollectionItem::Object { target } => {
                    if !schema.objects.contains_key(target) {
                        issues.push(SchemaIssue::UndefinedTarget {
                            owner: name.clone(),
                            member: collection.name.clone(),
                            target: target.clone(),
                        });
                    }
                }
                CollectionItem::Representation { representation } => {
                    if !schema.representations.contains_key(representation) {
                        issues.push(SchemaIssue::UndefinedRepresentation {
                            owner: name.clone(),
                            member: collection.name.clone(),
                            representation: representation.clone(),
                        });
                    }
                }
            }
        }
    }

    for (name, representation) in &schema.representations {
        check_unique(name, representation.fields.iter().map(|f| f.name.as_str()), &mut issues);
        for field in &representation.fields {
            check_field(schema, catalog, name, field, &mut issues);
        }
    }

    for (name, poly) in &schema.polymorphic {
        for (value, representation) in &poly.branches {
            if !schema.representations.contains_key(representation) {
                issues.push(SchemaIssue::UndefinedRepresentation {
                    owner: name.clone(),
                    member: value.clone(),
                    representation: representation.clone(),
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn check_unique<'a>(
    owner: &str,
    names: impl Iterator<Item = &'a str>,
    issues: &mut Vec<SchemaIssue>,
) {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            issues.push(SchemaIssue::DuplicateMember {
                owner: owner.to_string(),
                name: name.to_string(),
            });
        }
    }
}

fn check_field(
    schema: &Schema,
    catalog: &DataTypeCatalog,
    owner: &str,
    field: &FieldDef,
    issues: &mut Vec<SchemaIssue>,
) {
    if !catalog.contains(&field.data_type) {
        issues.push(SchemaIssue::UnknownType {
            owner: owner.to_string(),
            member: field.name.clone(),
            type_name: field.data_type.clone(),
        });
    }

    if let Ok(TypeExpr::Reference(representation)) = TypeExpr::parse(&field.data_type) {
        if !schema.representations.contains_key(&representation) {
            issues.push(SchemaIssue::UndefinedRepresentation {
                owner: owner.to_string(),
                member: field.name.clone(),
                representation,
            });
        }
    }

    let flags = &field.flags;
    let conflict = if flags.derived && flags.bulk_loaded {
        Some("a field cannot be both derived and bulk loaded")
    } else if flags.derived && field.column.is_some() {
        Some("derived fields have no storage column")
    } else if !flags.derived && !field.depends_on.is_empty() {
        Some("only derived fields declare dependencies")
    } else {
        None
    };
    if let Some(issue) = conflict {
        issues.push(SchemaIssue::ConflictingFlags {
            owner: owner.to_string(),
            member: field.name.clone(),
            issue: issue.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectType, RelationshipDef};

    fn schema_with(object: ObjectType) -> Schema {
        let mut schema = Schema::default();
        schema.objects.insert("Widget".into(), object);
        schema
    }

    #[test]
    fn test_valid_schema() {
        let schema = schema_with(ObjectType {
            table: "widgets".into(),
            fields: vec![FieldDef::new("id", "integer")],
            relationships: vec![],
            collections: vec![],
        });
        let catalog = schema.build_catalog().unwrap();
        assert!(validate(&schema, &catalog).is_ok());
    }

    #[test]
    fn test_reports_every_issue() {
        let schema = schema_with(ObjectType {
            table: "widgets".into(),
            fields: vec![
                FieldDef::new("id", "integer"),
                FieldDef::new("id", "string"),
                FieldDef::new("score", "float").derived(vec!["a"]).bulk_loaded(),
            ],
            relationships: vec![RelationshipDef::new("owner", "User", "owner_id", "id")],
            collections: vec![],
        });
        let catalog = schema.build_catalog().unwrap();
        let issues = validate(&schema, &catalog).unwrap_err();
        assert_eq!(issues.len(), 3);
        assert!(issues.contains(&SchemaIssue::DuplicateMember {
            owner: "Widget".into(),
            name: "id".into(),
        }));
        assert!(issues
            .iter()
            .any(|i| matches!(i, SchemaIssue::UndefinedTarget { target, .. } if target == "User")));
        assert!(issues
            .iter()
            .any(|i| matches!(i, SchemaIssue::ConflictingFlags { .. })));
    }

    #[test]
    fn test_missing_representation() {
        let schema = schema_with(ObjectType {
            table: "widgets".into(),
            fields: vec![FieldDef::new("address", "ref<Address>")],
            relationships: vec![],
            collections: vec![],
        });
        let catalog = schema.build_catalog().unwrap();
        let issues = validate(&schema, &catalog).unwrap_err();
        assert!(matches!(
            &issues[0],
            SchemaIssue::UndefinedRepresentation { representation, .. } if representation == "Address"
        ));
    }
}
