//! Homogeneous containers: arrays and string-keyed maps of one inner type.

use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::csv;
use super::error::{ConversionResult, DataTypeError, Validation, ValidationError};
use super::value::{describe, json_kind, ServerValue};
use super::{expect_server_value, DataType, TypeShape};
use crate::context::ConversionContext;

/// Render a stored scalar as text for the flat list encoding.
fn flat_text(value: &Json) -> ConversionResult<String> {
    match value {
        Json::String(s) => Ok(s.clone()),
        Json::Number(n) => Ok(n.to_string()),
        Json::Bool(b) => Ok(u8::from(*b).to_string()),
        other => Err(DataTypeError::conversion(format!(
            "list item {} has no flat form",
            describe(other)
        ))),
    }
}

// =============================================================================
// Array
// =============================================================================

/// A list of values of one inner type.
///
/// Parameters are a single CSV line; storage holds either a JSON list or a
/// `;`-delimited string with backslash escapes.
#[derive(Debug, Clone)]
pub struct ArrayType {
    name: String,
    inner: Arc<dyn DataType>,
    min_items: usize,
}

impl ArrayType {
    /// Lists of lists are not supported.
    pub fn new(inner: Arc<dyn DataType>, min_items: usize) -> ConversionResult<Self> {
        if matches!(inner.shape(), TypeShape::Array | TypeShape::OneOf) {
            return Err(DataTypeError::configuration(format!(
                "array items cannot be lists ({})",
                inner.name()
            )));
        }
        if !matches!(inner.shape(), TypeShape::Scalar) {
            return Err(DataTypeError::configuration(format!(
                "array items must be scalars ({})",
                inner.name()
            )));
        }
        let name = if min_items == 0 {
            format!("array<{}>", inner.name())
        } else {
            format!("array<{}, {}>", inner.name(), min_items)
        };
        Ok(Self {
            name,
            inner,
            min_items,
        })
    }

    pub fn inner(&self) -> &Arc<dyn DataType> {
        &self.inner
    }

    pub fn min_items(&self) -> usize {
        self.min_items
    }

    fn split_parameter(raw: &str) -> Result<Vec<String>, ValidationError> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        csv::parse_line(raw).map_err(|e| ValidationError::new(e.to_string()))
    }

    fn check_count(&self, count: usize) -> Validation {
        if count < self.min_items {
            return Err(ValidationError::new(format!(
                "expected at least {} item(s), got {}",
                self.min_items, count
            )));
        }
        Ok(())
    }

    /// Stored lists are a JSON list or the flat escaped string. A string is
    /// always read as the flat form, even when it looks like JSON.
    fn stored_items(value: &Json) -> ConversionResult<Vec<Json>> {
        match value {
            Json::Array(items) => Ok(items.clone()),
            Json::String(s) => Ok(csv::split_escaped(s).into_iter().map(Json::String).collect()),
            other => Err(DataTypeError::conversion(format!(
                "stored list has unexpected value {}",
                describe(other)
            ))),
        }
    }

    fn items_of<'a>(&self, value: &'a ServerValue) -> ConversionResult<&'a [ServerValue]> {
        expect_server_value(self, value)?;
        value
            .as_list()
            .ok_or_else(|| DataTypeError::conversion("array server value is not a list"))
    }
}

impl DataType for ArrayType {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> TypeShape {
        TypeShape::Array
    }

    fn validate_user_parameter_value(&self, raw: &str, ctx: &ConversionContext) -> Validation {
        let items = Self::split_parameter(raw)?;
        self.check_count(items.len())?;
        for (i, item) in items.iter().enumerate() {
            self.inner
                .validate_user_parameter_value(item, ctx)
                .map_err(|e| e.at(i))?;
        }
        Ok(())
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        self.validate_user_parameter_value(raw, ctx)?;
        Self::split_parameter(raw)?
            .iter()
            .map(|item| self.inner.convert_user_parameter_value_to_server_value(item, ctx))
            .collect::<ConversionResult<Vec<_>>>()
            .map(ServerValue::List)
    }

    fn validate_user_json_value(&self, value: &Json, ctx: &ConversionContext) -> Validation {
        let items = value.as_array().ok_or_else(|| {
            ValidationError::new(format!("expected a list, got {}", json_kind(value)))
        })?;
        self.check_count(items.len())?;
        for (i, item) in items.iter().enumerate() {
            if item.is_array() {
                return Err(ValidationError::new("nested lists are not supported").at(i));
            }
            self.inner
                .validate_user_json_value(item, ctx)
                .map_err(|e| e.at(i))?;
        }
        Ok(())
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        self.validate_user_json_value(value, ctx)?;
        value
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|item| self.inner.convert_user_json_value_to_server_value(item, ctx))
            .collect::<ConversionResult<Vec<_>>>()
            .map(ServerValue::List)
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        Self::stored_items(value)?
            .iter()
            .map(|item| self.inner.convert_database_value_to_server_value(item))
            .collect::<ConversionResult<Vec<_>>>()
            .map(ServerValue::List)
    }

    /// Lists are stored in their flat `;`-delimited form. The empty list has
    /// no flat form and is stored as an empty JSON list.
    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        let items = self.items_of(value)?;
        if items.is_empty() {
            return Ok(Json::Array(Vec::new()));
        }
        let texts = items
            .iter()
            .map(|item| flat_text(&self.inner.convert_server_value_to_database_value(item)?))
            .collect::<ConversionResult<Vec<_>>>()?;
        Ok(Json::String(csv::join_escaped(&texts)))
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        self.items_of(value)?
            .iter()
            .map(|item| self.inner.convert_server_value_to_api_value(item, ctx))
            .collect::<ConversionResult<Vec<_>>>()
            .map(Json::Array)
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        match value {
            ServerValue::List(items) => items.iter().all(|i| self.inner.is_server_value_type(i)),
            _ => false,
        }
    }
}

// =============================================================================
// Map
// =============================================================================

/// String-keyed entries of one inner type. There is no parameter form.
#[derive(Debug, Clone)]
pub struct MapType {
    name: String,
    inner: Arc<dyn DataType>,
    min_entries: usize,
}

impl MapType {
    pub fn new(inner: Arc<dyn DataType>, min_entries: usize) -> Self {
        let name = if min_entries == 0 {
            format!("map<{}>", inner.name())
        } else {
            format!("map<{}, {}>", inner.name(), min_entries)
        };
        Self {
            name,
            inner,
            min_entries,
        }
    }

    pub fn inner(&self) -> &Arc<dyn DataType> {
        &self.inner
    }

    pub fn min_entries(&self) -> usize {
        self.min_entries
    }

    /// Keys must hold something other than whitespace.
    fn is_valid_key(key: &str) -> bool {
        !key.trim().is_empty()
    }

    fn stored_entries(value: &Json) -> ConversionResult<Map<String, Json>> {
        match value {
            Json::Object(map) => Ok(map.clone()),
            Json::String(s) => match serde_json::from_str(s) {
                Ok(Json::Object(map)) => Ok(map),
                _ => Err(DataTypeError::conversion(format!(
                    "stored map has unexpected value {}",
                    describe(value)
                ))),
            },
            other => Err(DataTypeError::conversion(format!(
                "stored map has unexpected value {}",
                describe(other)
            ))),
        }
    }

    fn entries_of<'a>(
        &self,
        value: &'a ServerValue,
    ) -> ConversionResult<&'a BTreeMap<String, ServerValue>> {
        expect_server_value(self, value)?;
        value
            .as_map()
            .ok_or_else(|| DataTypeError::conversion("map server value is not a map"))
    }
}

impl DataType for MapType {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> TypeShape {
        TypeShape::Map
    }

    fn validate_user_parameter_value(&self, _raw: &str, _ctx: &ConversionContext) -> Validation {
        Err(ValidationError::new("maps cannot be passed as a parameter"))
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        _raw: &str,
        _ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        Err(DataTypeError::unsupported(&self.name, "parameter conversion"))
    }

    fn validate_user_json_value(&self, value: &Json, ctx: &ConversionContext) -> Validation {
        let entries = value.as_object().ok_or_else(|| {
            ValidationError::new(format!("expected an object, got {}", json_kind(value)))
        })?;
        if entries.len() < self.min_entries {
            return Err(ValidationError::new(format!(
                "expected at least {} entr(y/ies), got {}",
                self.min_entries,
                entries.len()
            )));
        }
        for (key, item) in entries {
            if !Self::is_valid_key(key) {
                return Err(ValidationError::new("keys must not be empty"));
            }
            self.inner
                .validate_user_json_value(item, ctx)
                .map_err(|e| ValidationError::new(format!("entry '{}': {}", key, e)))?;
        }
        Ok(())
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        self.validate_user_json_value(value, ctx)?;
        let mut entries = BTreeMap::new();
        if let Some(map) = value.as_object() {
            for (key, item) in map {
                entries.insert(
                    key.clone(),
                    self.inner.convert_user_json_value_to_server_value(item, ctx)?,
                );
            }
        }
        Ok(ServerValue::Map(entries))
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        let mut entries = BTreeMap::new();
        for (key, item) in Self::stored_entries(value)? {
            if !Self::is_valid_key(&key) {
                return Err(DataTypeError::conversion("stored map has an empty key"));
            }
            let converted = self.inner.convert_database_value_to_server_value(&item)?;
            entries.insert(key, converted);
        }
        Ok(ServerValue::Map(entries))
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        let mut out = Map::new();
        for (key, item) in self.entries_of(value)? {
            out.insert(key.clone(), self.inner.convert_server_value_to_database_value(item)?);
        }
        Ok(Json::Object(out))
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        let mut out = Map::new();
        for (key, item) in self.entries_of(value)? {
            out.insert(key.clone(), self.inner.convert_server_value_to_api_value(item, ctx)?);
        }
        Ok(Json::Object(out))
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        match value {
            ServerValue::Map(entries) => entries
                .iter()
                .all(|(k, v)| Self::is_valid_key(k) && self.inner.is_server_value_type(v)),
            _ => false,
        }
    }
}
