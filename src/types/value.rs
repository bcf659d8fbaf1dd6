//! Canonical in-process values.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// A server value: the strongly typed form business logic works with.
///
/// Nulls never appear inside a `ServerValue`; an absent or null leaf is
/// represented one level up by the structure that holds it.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    /// An instant with the offset it was supplied or stored with.
    DateTime(DateTime<FixedOffset>),
    List(Vec<ServerValue>),
    Map(BTreeMap<String, ServerValue>),
}

impl ServerValue {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerValue::Bool(_) => "bool",
            ServerValue::Int(_) => "int",
            ServerValue::Float(_) => "float",
            ServerValue::String(_) => "string",
            ServerValue::Date(_) => "date",
            ServerValue::Time(_) => "time",
            ServerValue::DateTime(_) => "datetime",
            ServerValue::List(_) => "list",
            ServerValue::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ServerValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ServerValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ServerValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ServerValue]> {
        match self {
            ServerValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ServerValue>> {
        match self {
            ServerValue::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<bool> for ServerValue {
    fn from(b: bool) -> Self {
        ServerValue::Bool(b)
    }
}

impl From<i64> for ServerValue {
    fn from(i: i64) -> Self {
        ServerValue::Int(i)
    }
}

impl From<f64> for ServerValue {
    fn from(f: f64) -> Self {
        ServerValue::Float(f)
    }
}

impl From<&str> for ServerValue {
    fn from(s: &str) -> Self {
        ServerValue::String(s.to_string())
    }
}

impl From<String> for ServerValue {
    fn from(s: String) -> Self {
        ServerValue::String(s)
    }
}

/// Name of a JSON value's shape, for validation messages.
pub fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Render a stored value for an internal diagnostic, truncated so that a
/// large blob does not flood the log.
pub(crate) fn describe(value: &Json) -> String {
    let mut rendered = value.to_string();
    if rendered.len() > 64 {
        let mut cut = 64;
        while !rendered.is_char_boundary(cut) {
            cut -= 1;
        }
        rendered.truncate(cut);
        rendered.push('…');
    }
    rendered
}
