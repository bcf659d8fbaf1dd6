//! Raw extraction and stage conversion driven by a selection set.

use std::borrow::Cow;

use serde_json::{Map, Value as Json};

use super::hooks::{Augmenter, DerivedFields};
use super::record::{Projected, Record};
use super::stage::{ApiStage, ServerStage, Stage};
use super::{ProjectionError, ProjectionResult};
use crate::context::ConversionContext;
use crate::schema::FieldDef;
use crate::selection::{CollectionSelection, RepresentationSelection, Selection, SelectionSet};
use crate::types::{json_kind, CatalogError, DataTypeCatalog, ServerValue};

/// Projects raw nested records through the catalog's data types.
#[derive(Debug, Clone, Copy)]
pub struct RecordProjector<'a> {
    catalog: &'a DataTypeCatalog,
    derived: &'a DerivedFields,
}

impl<'a> RecordProjector<'a> {
    pub fn new(catalog: &'a DataTypeCatalog, derived: &'a DerivedFields) -> Self {
        Self { catalog, derived }
    }

    // =========================================================================
    // Raw extraction
    // =========================================================================

    /// Read the selected values out of a raw record.
    ///
    /// Plain fields are read at their storage name, derived fields come from
    /// their hook, and to-one relationships recurse into nested records.
    /// Bulk-loaded and custom fields, bulk-loaded relationships and
    /// collections are skipped.
    pub fn extract(
        &self,
        selections: &SelectionSet,
        raw: &Map<String, Json>,
    ) -> ProjectionResult<Record<Json>> {
        let mut out = Record::new();
        for selection in selections {
            match selection {
                Selection::Field(field) => {
                    if let Some(value) = raw.get(field.storage_name()) {
                        out.insert(field.name.clone(), Projected::leaf(value.clone()));
                    }
                }
                Selection::Derived(field) => {
                    let value = self.compute_derived(selections.owner_name(), field, raw)?;
                    out.insert(field.name.clone(), Projected::leaf(value));
                }
                Selection::BulkLoaded(_) | Selection::Collection { .. } => {}
                Selection::Relationship {
                    def,
                    selections: nested,
                    ..
                } => {
                    if def.bulk_loaded {
                        continue;
                    }
                    match raw.get(&def.name) {
                        None => {}
                        Some(Json::Null) => {
                            out.insert(def.name.clone(), Projected::Null);
                        }
                        Some(Json::Object(child)) => {
                            let child = self.extract(nested, child)?;
                            out.insert(def.name.clone(), Projected::Object(child));
                        }
                        Some(other) => {
                            return Err(ProjectionError::ShapeMismatch {
                                field: def.name.clone(),
                                expected: "object",
                                found: json_kind(other),
                            })
                        }
                    }
                }
                Selection::Representation { field, target } => {
                    let Some(value) = raw.get(field.storage_name()) else {
                        continue;
                    };
                    if value.is_null() {
                        out.insert(field.name.clone(), Projected::Null);
                        continue;
                    }
                    let embedded = embedded_object(field, value)?;
                    let record = self.extract_representation(field, target, &embedded)?;
                    out.insert(field.name.clone(), Projected::Object(record));
                }
            }
        }
        Ok(out)
    }

    fn compute_derived(
        &self,
        owner: &str,
        field: &FieldDef,
        raw: &Map<String, Json>,
    ) -> ProjectionResult<Json> {
        let hook = self.derived.get(owner, &field.name).ok_or_else(|| {
            tracing::error!(owner = owner, field = %field.name, "no hook for derived field");
            ProjectionError::UnhandledDerivedField {
                owner: owner.to_string(),
                field: field.name.clone(),
            }
        })?;
        hook.compute(raw).map_err(|message| ProjectionError::Hook {
            owner: owner.to_string(),
            field: field.name.clone(),
            message,
        })
    }

    fn extract_representation(
        &self,
        field: &FieldDef,
        target: &RepresentationSelection,
        embedded: &Map<String, Json>,
    ) -> ProjectionResult<Record<Json>> {
        match target {
            RepresentationSelection::Fixed(set) => self.extract(set, embedded),
            RepresentationSelection::Polymorphic {
                type_name,
                discriminator,
                branches,
            } => {
                let polymorphic = self
                    .catalog
                    .polymorphic(type_name)
                    .ok_or_else(|| CatalogError::UnknownType(type_name.clone()))?;
                let branch = polymorphic.resolve_branch(embedded).map_err(|source| {
                    ProjectionError::Discriminator {
                        field: field.name.clone(),
                        source,
                    }
                })?;
                let set = branches.get(&branch.value).ok_or_else(|| {
                    ProjectionError::UnknownBranch {
                        field: field.name.clone(),
                        value: branch.value.clone(),
                    }
                })?;
                let mut record = self.extract(set, embedded)?;
                record
                    .entry(discriminator.clone())
                    .or_insert_with(|| Projected::Value(Json::String(branch.value.clone())));
                Ok(record)
            }
        }
    }

    // =========================================================================
    // Stage conversion
    // =========================================================================

    /// Convert an extracted (and augmented) record to server values.
    pub fn to_server(
        &self,
        selections: &SelectionSet,
        record: &Record<Json>,
    ) -> ProjectionResult<Record<ServerValue>> {
        self.convert(selections, record, &ServerStage)
    }

    /// Convert an extracted (and augmented) record to API values.
    pub fn to_api(
        &self,
        selections: &SelectionSet,
        record: &Record<Json>,
        ctx: &ConversionContext,
    ) -> ProjectionResult<Record<Json>> {
        self.convert(selections, record, &ApiStage::new(ctx))
    }

    /// Walk `record` along `selections`, converting every leaf with `stage`.
    ///
    /// Absent keys stay absent. Present nulls become [`Projected::Null`]
    /// without consulting the data type.
    pub fn convert<S: Stage>(
        &self,
        selections: &SelectionSet,
        record: &Record<Json>,
        stage: &S,
    ) -> ProjectionResult<Record<S::Output>> {
        let mut out = Record::new();
        for selection in selections {
            let name = selection.name();
            let Some(value) = record.get(name) else {
                continue;
            };
            if value.is_null() {
                out.insert(name.to_string(), Projected::Null);
                continue;
            }

            let converted = match selection {
                Selection::Field(field)
                | Selection::Derived(field)
                | Selection::BulkLoaded(field) => {
                    self.convert_leaf(name, &field.data_type, value, stage)?
                }
                Selection::Relationship { selections, .. } => {
                    let child = expect_object(name, value)?;
                    Projected::Object(self.convert(selections, &child, stage)?)
                }
                Selection::Collection { items, .. } => {
                    let list = expect_list(name, value)?;
                    let mut converted = Vec::with_capacity(list.len());
                    for item in list.iter() {
                        converted.push(match (item, items) {
                            (Projected::Null, _) => Projected::Null,
                            (item, CollectionSelection::Scalar { data_type }) => {
                                self.convert_leaf(name, data_type, item, stage)?
                            }
                            (item, CollectionSelection::Object(set))
                            | (item, CollectionSelection::Representation(set)) => {
                                let child = expect_object(name, item)?;
                                Projected::Object(self.convert(set, &child, stage)?)
                            }
                        });
                    }
                    Projected::List(converted)
                }
                Selection::Representation { target, .. } => {
                    let child = expect_object(name, value)?;
                    Projected::Object(self.convert_representation(name, target, &child, stage)?)
                }
            };
            out.insert(name.to_string(), converted);
        }
        Ok(out)
    }

    fn convert_leaf<S: Stage>(
        &self,
        name: &str,
        type_name: &str,
        value: &Projected<Json>,
        stage: &S,
    ) -> ProjectionResult<Projected<S::Output>> {
        let data_type = self.catalog.get(type_name)?;
        let raw = match value {
            Projected::Value(v) => Cow::Borrowed(v),
            other => Cow::Owned(other.to_json()),
        };
        tracing::trace!(field = name, data_type = type_name, stage = stage.name(), "converting leaf");
        stage
            .convert(data_type.as_ref(), &raw)
            .map(Projected::Value)
            .map_err(|source| ProjectionError::Conversion {
                field: name.to_string(),
                source,
            })
    }

    fn convert_representation<S: Stage>(
        &self,
        name: &str,
        target: &RepresentationSelection,
        record: &Record<Json>,
        stage: &S,
    ) -> ProjectionResult<Record<S::Output>> {
        match target {
            RepresentationSelection::Fixed(set) => self.convert(set, record, stage),
            RepresentationSelection::Polymorphic {
                discriminator,
                branches,
                ..
            } => {
                let key = match record.get(discriminator).and_then(Projected::as_value) {
                    Some(Json::String(s)) => s.clone(),
                    Some(Json::Number(n)) => n.to_string(),
                    _ => {
                        return Err(ProjectionError::MissingDiscriminator {
                            field: name.to_string(),
                            discriminator: discriminator.clone(),
                        })
                    }
                };
                let set = branches
                    .get(&key)
                    .ok_or_else(|| ProjectionError::UnknownBranch {
                        field: name.to_string(),
                        value: key.clone(),
                    })?;
                let mut out = self.convert(set, record, stage)?;
                out.entry(discriminator.clone())
                    .or_insert_with(|| Projected::Value(stage.discriminator(&key)));
                Ok(out)
            }
        }
    }

    // =========================================================================
    // One-shot projection
    // =========================================================================

    /// Extract, augment and convert `raw` to server values.
    pub fn project_server(
        &self,
        selections: &SelectionSet,
        raw: &Map<String, Json>,
        augmenter: Option<&dyn Augmenter>,
    ) -> ProjectionResult<Record<ServerValue>> {
        let record = self.extract_augmented(selections, raw, augmenter)?;
        self.to_server(selections, &record)
    }

    /// Extract, augment and convert `raw` to API values.
    pub fn project_api(
        &self,
        selections: &SelectionSet,
        raw: &Map<String, Json>,
        augmenter: Option<&dyn Augmenter>,
        ctx: &ConversionContext,
    ) -> ProjectionResult<Record<Json>> {
        let record = self.extract_augmented(selections, raw, augmenter)?;
        self.to_api(selections, &record, ctx)
    }

    fn extract_augmented(
        &self,
        selections: &SelectionSet,
        raw: &Map<String, Json>,
        augmenter: Option<&dyn Augmenter>,
    ) -> ProjectionResult<Record<Json>> {
        let mut record = self.extract(selections, raw)?;
        if let Some(augmenter) = augmenter {
            augmenter.augment(selections, &mut record)?;
        }
        Ok(record)
    }
}

/// The object stored in a representation column: inline JSON or JSON text.
fn embedded_object<'v>(
    field: &FieldDef,
    value: &'v Json,
) -> ProjectionResult<Cow<'v, Map<String, Json>>> {
    let mismatch = |found| ProjectionError::ShapeMismatch {
        field: field.name.clone(),
        expected: "object",
        found,
    };
    match value {
        Json::Object(map) => Ok(Cow::Borrowed(map)),
        Json::String(text) => match serde_json::from_str::<Json>(text) {
            Ok(Json::Object(map)) => Ok(Cow::Owned(map)),
            _ => Err(mismatch("string")),
        },
        other => Err(mismatch(json_kind(other))),
    }
}

/// Nested records arrive as records or, from augmenters, as JSON objects.
fn expect_object<'v>(
    name: &str,
    value: &'v Projected<Json>,
) -> ProjectionResult<Cow<'v, Record<Json>>> {
    match value {
        Projected::Object(record) => Ok(Cow::Borrowed(record)),
        Projected::Value(Json::Object(map)) => Ok(Cow::Owned(
            map.iter()
                .map(|(k, v)| (k.clone(), Projected::from_json(v.clone())))
                .collect(),
        )),
        other => Err(ProjectionError::ShapeMismatch {
            field: name.to_string(),
            expected: "object",
            found: other.shape(),
        }),
    }
}

fn expect_list<'v>(
    name: &str,
    value: &'v Projected<Json>,
) -> ProjectionResult<Cow<'v, [Projected<Json>]>> {
    match value {
        Projected::List(items) => Ok(Cow::Borrowed(items.as_slice())),
        Projected::Value(Json::Array(items)) => Ok(Cow::Owned(
            items.iter().cloned().map(Projected::from_json).collect(),
        )),
        other => Err(ProjectionError::ShapeMismatch {
            field: name.to_string(),
            expected: "list",
            found: other.shape(),
        }),
    }
}
