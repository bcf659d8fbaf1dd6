//! Nested projection output.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

use crate::types::ApiWriter;

/// Projected output keyed by selection name.
pub type Record<T> = BTreeMap<String, Projected<T>>;

/// One projected entry. A key that is absent from its [`Record`] was not
/// produced; [`Projected::Null`] is an explicit null.
#[derive(Debug, Clone, PartialEq)]
pub enum Projected<T> {
    Null,
    Value(T),
    Object(Record<T>),
    List(Vec<Projected<T>>),
}

impl<T> Projected<T> {
    pub fn is_null(&self) -> bool {
        matches!(self, Projected::Null)
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Projected::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Record<T>> {
        match self {
            Projected::Object(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Projected<T>]> {
        match self {
            Projected::List(items) => Some(items),
            _ => None,
        }
    }

    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Projected::Null => "null",
            Projected::Value(_) => "value",
            Projected::Object(_) => "object",
            Projected::List(_) => "list",
        }
    }
}

impl Projected<Json> {
    /// A leaf value; JSON null becomes [`Projected::Null`].
    pub fn leaf(value: Json) -> Self {
        match value {
            Json::Null => Projected::Null,
            other => Projected::Value(other),
        }
    }

    /// Structural conversion: objects become records and arrays become lists.
    /// Handy when augmenting related records or collections.
    pub fn from_json(value: Json) -> Self {
        match value {
            Json::Null => Projected::Null,
            Json::Object(map) => Projected::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Projected::from_json(v)))
                    .collect(),
            ),
            Json::Array(items) => {
                Projected::List(items.into_iter().map(Projected::from_json).collect())
            }
            other => Projected::Value(other),
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Projected::Null => Json::Null,
            Projected::Value(v) => v.clone(),
            Projected::Object(record) => record_to_json(record),
            Projected::List(items) => Json::Array(items.iter().map(Projected::to_json).collect()),
        }
    }
}

/// Render a JSON-stage record as a JSON object.
pub fn record_to_json(record: &Record<Json>) -> Json {
    let object: Map<String, Json> = record
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    Json::Object(object)
}

/// Emit every entry of an API-stage record into `sink`.
pub fn write_record(sink: &mut dyn ApiWriter, record: &Record<Json>) {
    for (name, value) in record {
        match value {
            Projected::Null => sink.write_null(name),
            other => sink.write_value(name, other.to_json()),
        }
    }
}
