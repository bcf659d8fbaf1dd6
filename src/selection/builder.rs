//! Building selection sets from dotted request paths.

use std::collections::BTreeMap;

use super::{
    CollectionSelection, Owner, RepresentationSelection, Selection, SelectionError,
    SelectionResult, SelectionSet,
};
use crate::schema::{
    CollectionDef, CollectionItem, FieldDef, Member, PolymorphicDef, RelationshipDef, Schema,
};
use crate::types::TypeExpr;

/// Representations nested deeper than this are rejected.
const MAX_DEPTH: usize = 16;

enum FieldTarget<'s> {
    Fixed(String),
    Polymorphic(&'s str, &'s PolymorphicDef),
}

fn field_target<'s>(schema: &'s Schema, field: &'s FieldDef) -> Option<FieldTarget<'s>> {
    if let Some((name, def)) = schema.polymorphic.get_key_value(&field.data_type) {
        return Some(FieldTarget::Polymorphic(name, def));
    }
    match TypeExpr::parse(&field.data_type) {
        Ok(TypeExpr::Reference(representation)) => Some(FieldTarget::Fixed(representation)),
        _ => None,
    }
}

fn split_path(path: &str) -> SelectionResult<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(SelectionError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

impl SelectionSet {
    /// Build a selection set for `object` from dotted paths.
    ///
    /// A bare relationship, collection or representation name selects all
    /// of its fields. Repeated paths merge.
    pub fn build<S: AsRef<str>>(
        schema: &Schema,
        object: &str,
        paths: &[S],
    ) -> SelectionResult<Self> {
        let mut set = Self::for_object(schema, object)?;
        for path in paths {
            set.add_path(schema, path.as_ref())?;
        }
        Ok(set)
    }

    /// Every field of `object`, without relationships or collections.
    pub fn all_fields(schema: &Schema, object: &str) -> SelectionResult<Self> {
        let mut set = Self::for_object(schema, object)?;
        set.add_all_fields(schema, 0)?;
        Ok(set)
    }

    fn for_object(schema: &Schema, object: &str) -> SelectionResult<Self> {
        let def = schema
            .object(object)
            .ok_or_else(|| SelectionError::UnknownObject(object.to_string()))?;
        Ok(Self::new(Owner::Object {
            name: object.to_string(),
            table: def.table.clone(),
        }))
    }

    fn for_representation(schema: &Schema, name: &str) -> SelectionResult<Self> {
        schema
            .representation(name)
            .ok_or_else(|| SelectionError::UnknownRepresentation(name.to_string()))?;
        Ok(Self::new(Owner::Representation {
            name: name.to_string(),
        }))
    }

    /// Add one dotted path.
    pub fn add_path(&mut self, schema: &Schema, path: &str) -> SelectionResult<()> {
        let segments = split_path(path)?;
        self.add_segments(schema, &segments, 0)
    }

    fn add_segments(
        &mut self,
        schema: &Schema,
        segments: &[&str],
        depth: usize,
    ) -> SelectionResult<()> {
        let Some((head, rest)) = segments.split_first() else {
            return self.add_all_fields(schema, depth);
        };
        let unknown = || SelectionError::UnknownMember {
            owner: self.owner_name().to_string(),
            member: head.to_string(),
        };

        match self.owner.clone() {
            Owner::Object { name, .. } => {
                let object = schema
                    .object(&name)
                    .ok_or_else(|| SelectionError::UnknownObject(name.clone()))?;
                match object.member(head).ok_or_else(unknown)? {
                    Member::Field(field) => self.add_field(schema, field, rest, depth),
                    Member::Relationship(rel) => self.add_relationship(schema, rel, rest, depth),
                    Member::Collection(collection) => {
                        self.add_collection(schema, collection, rest, depth)
                    }
                }
            }
            Owner::Representation { name } => {
                let representation = schema
                    .representation(&name)
                    .ok_or_else(|| SelectionError::UnknownRepresentation(name.clone()))?;
                let field = representation.field(head).ok_or_else(unknown)?;
                self.add_field(schema, field, rest, depth)
            }
        }
    }

    fn add_all_fields(&mut self, schema: &Schema, depth: usize) -> SelectionResult<()> {
        let fields = match &self.owner {
            Owner::Object { name, .. } => {
                &schema
                    .object(name)
                    .ok_or_else(|| SelectionError::UnknownObject(name.clone()))?
                    .fields
            }
            Owner::Representation { name } => {
                &schema
                    .representation(name)
                    .ok_or_else(|| SelectionError::UnknownRepresentation(name.clone()))?
                    .fields
            }
        };
        for field in fields {
            self.add_field(schema, field, &[], depth)?;
        }
        Ok(())
    }

    fn add_field(
        &mut self,
        schema: &Schema,
        field: &FieldDef,
        rest: &[&str],
        depth: usize,
    ) -> SelectionResult<()> {
        let Some(target) = field_target(schema, field) else {
            if !rest.is_empty() {
                return Err(SelectionError::NotTraversable {
                    owner: self.owner_name().to_string(),
                    member: field.name.clone(),
                });
            }
            if self.get(&field.name).is_none() {
                let flags = &field.flags;
                self.push(if flags.derived {
                    Selection::Derived(field.clone())
                } else if flags.bulk_loaded || flags.custom {
                    Selection::BulkLoaded(field.clone())
                } else {
                    Selection::Field(field.clone())
                });
            }
            return Ok(());
        };

        if depth >= MAX_DEPTH {
            return Err(SelectionError::TooDeep(self.owner_name().to_string()));
        }

        if self.get(&field.name).is_none() {
            let target = match target {
                FieldTarget::Fixed(representation) => RepresentationSelection::Fixed(
                    Self::for_representation(schema, &representation)?,
                ),
                FieldTarget::Polymorphic(type_name, def) => {
                    let mut branches = BTreeMap::new();
                    for (value, representation) in &def.branches {
                        branches.insert(
                            value.clone(),
                            Self::for_representation(schema, representation)?,
                        );
                    }
                    RepresentationSelection::Polymorphic {
                        type_name: type_name.to_string(),
                        discriminator: def.discriminator.clone(),
                        branches,
                    }
                }
            };
            self.push(Selection::Representation {
                field: field.clone(),
                target,
            });
        }

        if let Some(Selection::Representation { target, .. }) = self.get_mut(&field.name) {
            target.add_segments(schema, rest, depth + 1)?;
        }
        Ok(())
    }

    fn add_relationship(
        &mut self,
        schema: &Schema,
        rel: &RelationshipDef,
        rest: &[&str],
        depth: usize,
    ) -> SelectionResult<()> {
        if self.get(&rel.name).is_none() {
            let selections = Self::for_object(schema, &rel.target)?;
            let table = selections.table().unwrap_or_default().to_string();
            self.push(Selection::Relationship {
                def: rel.clone(),
                table,
                selections,
            });
        }
        if let Some(Selection::Relationship { selections, .. }) = self.get_mut(&rel.name) {
            selections.add_segments(schema, rest, depth)?;
        }
        Ok(())
    }

    fn add_collection(
        &mut self,
        schema: &Schema,
        collection: &CollectionDef,
        rest: &[&str],
        depth: usize,
    ) -> SelectionResult<()> {
        if self.get(&collection.name).is_none() {
            let items = match &collection.item {
                CollectionItem::Scalar { data_type } => CollectionSelection::Scalar {
                    data_type: data_type.clone(),
                },
                CollectionItem::Object { target } => {
                    CollectionSelection::Object(Self::for_object(schema, target)?)
                }
                CollectionItem::Representation { representation } => {
                    CollectionSelection::Representation(Self::for_representation(
                        schema,
                        representation,
                    )?)
                }
            };
            self.push(Selection::Collection {
                def: collection.clone(),
                items,
            });
        }

        let owner = self.owner_name().to_string();
        if let Some(Selection::Collection { items, .. }) = self.get_mut(&collection.name) {
            match items {
                CollectionSelection::Scalar { .. } => {
                    if !rest.is_empty() {
                        return Err(SelectionError::NotTraversable {
                            owner,
                            member: collection.name.clone(),
                        });
                    }
                }
                CollectionSelection::Object(set) | CollectionSelection::Representation(set) => {
                    set.add_segments(schema, rest, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

impl RepresentationSelection {
    fn add_segments(
        &mut self,
        schema: &Schema,
        segments: &[&str],
        depth: usize,
    ) -> SelectionResult<()> {
        match self {
            RepresentationSelection::Fixed(set) => set.add_segments(schema, segments, depth),
            RepresentationSelection::Polymorphic {
                type_name,
                branches,
                ..
            } => {
                let Some(head) = segments.first() else {
                    for set in branches.values_mut() {
                        set.add_all_fields(schema, depth)?;
                    }
                    return Ok(());
                };
                let mut matched = false;
                for set in branches.values_mut() {
                    let has_member = schema
                        .representation(set.owner_name())
                        .is_some_and(|r| r.field(head).is_some());
                    if has_member {
                        set.add_segments(schema, segments, depth)?;
                        matched = true;
                    }
                }
                if matched {
                    Ok(())
                } else {
                    Err(SelectionError::UnknownMember {
                        owner: type_name.clone(),
                        member: head.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = r#"
[polymorphic.payment]
discriminator = "kind"
branches = { card = "CardPayment", bank = "BankPayment" }

[representations.CardPayment]
fields = [{ name = "last4", type = "string" }, { name = "brand", type = "string" }]

[representations.BankPayment]
fields = [{ name = "iban", type = "string" }]

[representations.Address]
fields = [{ name = "city", type = "string" }, { name = "zip", type = "string" }]

[objects.Widget]
table = "widgets"
fields = [
    { name = "id", type = "integer" },
    { name = "name", type = "string" },
    { name = "score", type = "float", derived = true, depends_on = ["hits", "misses"] },
    { name = "rank", type = "integer", bulk_loaded = true },
    { name = "address", type = "ref<Address>" },
    { name = "payment", type = "payment" },
]
relationships = [
    { name = "owner", target = "User", join = { parent = "owner_id", child = "id" } },
]
collections = [
    { name = "tags", item = { kind = "scalar", type = "string" } },
]

[objects.User]
table = "users"
fields = [{ name = "name", type = "string" }, { name = "email", type = "string" }]
"#;

    fn schema() -> Schema {
        Schema::from_toml_str(SCHEMA).unwrap()
    }

    #[test]
    fn test_classifies_fields() {
        let set = SelectionSet::build(&schema(), "Widget", &["id", "score", "rank"]).unwrap();
        assert!(matches!(set.get("id"), Some(Selection::Field(_))));
        assert!(matches!(set.get("score"), Some(Selection::Derived(_))));
        assert!(matches!(set.get("rank"), Some(Selection::BulkLoaded(_))));
    }

    #[test]
    fn test_paths_merge() {
        let set =
            SelectionSet::build(&schema(), "Widget", &["owner.name", "owner.email", "owner.name"])
                .unwrap();
        assert_eq!(set.len(), 1);
        let Some(Selection::Relationship { selections, table, .. }) = set.get("owner") else {
            panic!("owner should be a relationship");
        };
        assert_eq!(table, "users");
        assert_eq!(selections.names(), ["name", "email"]);
    }

    #[test]
    fn test_bare_name_selects_all_fields() {
        let set = SelectionSet::build(&schema(), "Widget", &["address", "owner"]).unwrap();
        let Some(Selection::Representation {
            target: RepresentationSelection::Fixed(address),
            ..
        }) = set.get("address")
        else {
            panic!("address should be a fixed representation");
        };
        assert_eq!(address.names(), ["city", "zip"]);
        let Some(Selection::Relationship { selections, .. }) = set.get("owner") else {
            panic!("owner should be a relationship");
        };
        assert_eq!(selections.names(), ["name", "email"]);
    }

    #[test]
    fn test_polymorphic_path_reaches_matching_branches() {
        let set = SelectionSet::build(&schema(), "Widget", &["payment.last4"]).unwrap();
        let Some(Selection::Representation {
            target:
                RepresentationSelection::Polymorphic {
                    discriminator,
                    branches,
                    ..
                },
            ..
        }) = set.get("payment")
        else {
            panic!("payment should be polymorphic");
        };
        assert_eq!(discriminator, "kind");
        assert_eq!(branches["card"].names(), ["last4"]);
        assert!(branches["bank"].is_empty());

        let err = SelectionSet::build(&schema(), "Widget", &["payment.cvv"]).unwrap_err();
        assert!(matches!(err, SelectionError::UnknownMember { owner, .. } if owner == "payment"));
    }

    #[test]
    fn test_errors() {
        let schema = schema();
        assert!(matches!(
            SelectionSet::build(&schema, "Gadget", &["id"]),
            Err(SelectionError::UnknownObject(_))
        ));
        assert!(matches!(
            SelectionSet::build(&schema, "Widget", &["nope"]),
            Err(SelectionError::UnknownMember { .. })
        ));
        assert!(matches!(
            SelectionSet::build(&schema, "Widget", &["id.value"]),
            Err(SelectionError::NotTraversable { .. })
        ));
        assert!(matches!(
            SelectionSet::build(&schema, "Widget", &["tags.first"]),
            Err(SelectionError::NotTraversable { .. })
        ));
        assert!(matches!(
            SelectionSet::build(&schema, "Widget", &["owner..name"]),
            Err(SelectionError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_all_fields() {
        let set = SelectionSet::all_fields(&schema(), "User").unwrap();
        assert_eq!(set.names(), ["name", "email"]);
        assert_eq!(set.table(), Some("users"));
    }
}
