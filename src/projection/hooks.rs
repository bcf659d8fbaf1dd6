//! Seams for values the primary fetch cannot produce.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value as Json};

use super::{ProjectionResult, Record};
use crate::selection::SelectionSet;

/// Computes a derived field from the raw record it belongs to.
///
/// The result is a database-stage value and is converted through the
/// field's data type like any stored value.
pub trait DerivedFieldHook: Send + Sync {
    fn compute(&self, record: &Map<String, Json>) -> Result<Json, String>;
}

impl<F> DerivedFieldHook for F
where
    F: Fn(&Map<String, Json>) -> Result<Json, String> + Send + Sync,
{
    fn compute(&self, record: &Map<String, Json>) -> Result<Json, String> {
        self(record)
    }
}

/// Derived-field hooks keyed by owner (object or representation) and field.
#[derive(Clone, Default)]
pub struct DerivedFields {
    hooks: HashMap<(String, String), Arc<dyn DerivedFieldHook>>,
}

impl fmt::Debug for DerivedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .hooks
            .keys()
            .map(|(owner, field)| format!("{}.{}", owner, field))
            .collect();
        keys.sort();
        f.debug_struct("DerivedFields").field("hooks", &keys).finish()
    }
}

impl DerivedFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        owner: impl Into<String>,
        field: impl Into<String>,
        hook: impl DerivedFieldHook + 'static,
    ) -> &mut Self {
        self.hooks.insert((owner.into(), field.into()), Arc::new(hook));
        self
    }

    pub fn get(&self, owner: &str, field: &str) -> Option<&Arc<dyn DerivedFieldHook>> {
        self.hooks.get(&(owner.to_string(), field.to_string()))
    }
}

/// Writes bulk-loaded fields, bulk-loaded relationships and collections into
/// an extracted record before stage conversion.
///
/// Keys are selection names. A key the augmenter never writes is omitted
/// from the projection; an explicit [`super::Projected::Null`] is kept.
pub trait Augmenter {
    fn augment(&self, selections: &SelectionSet, record: &mut Record<Json>)
        -> ProjectionResult<()>;
}

impl<F> Augmenter for F
where
    F: Fn(&SelectionSet, &mut Record<Json>) -> ProjectionResult<()>,
{
    fn augment(
        &self,
        selections: &SelectionSet,
        record: &mut Record<Json>,
    ) -> ProjectionResult<()> {
        self(selections, record)
    }
}
