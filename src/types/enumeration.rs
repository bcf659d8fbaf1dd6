//! Enumerations backed by an integer code ↔ display name table.
//!
//! Tables are supplied by an [`EnumResolver`] and resolved at most once per
//! type. The catalog forces resolution while it is being built, so a broken
//! table is a startup failure rather than a request failure.

use once_cell::sync::OnceCell;
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::error::{CatalogError, ConversionResult, DataTypeError, Validation, ValidationError};
use super::value::{describe, json_kind, ServerValue};
use super::{expect_server_value, DataType};
use crate::context::ConversionContext;

/// A validated code ↔ name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTable {
    names: BTreeMap<i64, String>,
    codes: HashMap<String, i64>,
}

impl EnumTable {
    /// Build a table from `(code, name)` entries in declaration order.
    ///
    /// A missing code takes the next position after the largest code seen so
    /// far (starting at 0). Names must be present and unique ignoring case.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (Option<i64>, Option<S>)>,
        S: Into<String>,
    {
        let mut names = BTreeMap::new();
        let mut codes = HashMap::new();
        let mut next_code = 0i64;

        for (code, name) in entries {
            let code = code.unwrap_or(next_code);
            let name: String = name
                .map(Into::into)
                .ok_or_else(|| format!("code {} has no name", code))?;
            let folded = name.to_lowercase();

            if names.contains_key(&code) {
                return Err(format!("code {} is declared twice", code));
            }
            if codes.contains_key(&folded) {
                return Err(format!("name '{}' is declared twice", folded));
            }

            next_code = next_code.max(code.saturating_add(1));
            codes.insert(folded, code);
            names.insert(code, name);
        }

        Ok(Self { names, codes })
    }

    /// Build a table from JSON: either a list of names (positional codes) or
    /// an object keyed by integer code.
    pub fn from_json(value: &Json) -> Result<Self, String> {
        fn name_of(value: &Json) -> Result<Option<String>, String> {
            match value {
                Json::Null => Ok(None),
                Json::String(s) => Ok(Some(s.clone())),
                other => Err(format!("names must be strings, got {}", json_kind(other))),
            }
        }

        match value {
            Json::Array(items) => {
                let entries = items
                    .iter()
                    .map(|item| Ok((None, name_of(item)?)))
                    .collect::<Result<Vec<_>, String>>()?;
                Self::from_entries(entries)
            }
            Json::Object(map) => {
                let entries = map
                    .iter()
                    .map(|(key, item)| {
                        let code = key
                            .trim()
                            .parse::<i64>()
                            .map_err(|_| format!("key '{}' is not an integer", key))?;
                        Ok((Some(code), name_of(item)?))
                    })
                    .collect::<Result<Vec<_>, String>>()?;
                Self::from_entries(entries)
            }
            other => Err(format!(
                "expected a list or an object of names, got {}",
                json_kind(other)
            )),
        }
    }

    /// Case-insensitive lookup of a code by name.
    pub fn code_for(&self, name: &str) -> Option<i64> {
        self.codes.get(&name.to_lowercase()).copied()
    }

    /// Display name as declared.
    pub fn name_for(&self, code: i64) -> Option<&str> {
        self.names.get(&code).map(String::as_str)
    }

    pub fn contains_code(&self, code: i64) -> bool {
        self.names.contains_key(&code)
    }

    /// `(code, name)` pairs ordered by code.
    pub fn entries(&self) -> impl Iterator<Item = (i64, &str)> {
        self.names.iter().map(|(code, name)| (*code, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Supplies enum tables by identifier.
pub trait EnumResolver: fmt::Debug + Send + Sync {
    fn resolve(&self, enum_id: &str) -> Result<EnumTable, String>;
}

/// Resolver over tables declared up front, e.g. in a schema file.
#[derive(Debug, Clone, Default)]
pub struct StaticEnumResolver {
    tables: HashMap<String, Json>,
}

impl StaticEnumResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, enum_id: impl Into<String>, table: Json) -> Self {
        self.tables.insert(enum_id.into(), table);
        self
    }

    pub fn insert(&mut self, enum_id: impl Into<String>, table: Json) {
        self.tables.insert(enum_id.into(), table);
    }
}

impl EnumResolver for StaticEnumResolver {
    fn resolve(&self, enum_id: &str) -> Result<EnumTable, String> {
        let raw = self
            .tables
            .get(enum_id)
            .ok_or_else(|| format!("no table declared for '{}'", enum_id))?;
        EnumTable::from_json(raw)
    }
}

/// An enumeration. Server values are integer codes; API values are the
/// lowercased display names.
pub struct EnumType {
    name: String,
    enum_id: String,
    resolver: Arc<dyn EnumResolver>,
    table: OnceCell<EnumTable>,
}

impl fmt::Debug for EnumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumType")
            .field("name", &self.name)
            .field("enum_id", &self.enum_id)
            .field("loaded", &self.table.get().is_some())
            .finish()
    }
}

impl EnumType {
    pub fn new(
        name: impl Into<String>,
        enum_id: impl Into<String>,
        resolver: Arc<dyn EnumResolver>,
    ) -> Self {
        Self {
            name: name.into(),
            enum_id: enum_id.into(),
            resolver,
            table: OnceCell::new(),
        }
    }

    /// An enum whose table is already known.
    pub fn with_table(name: impl Into<String>, table: EnumTable) -> Self {
        let name = name.into();
        Self {
            enum_id: name.clone(),
            name,
            resolver: Arc::new(StaticEnumResolver::new()),
            table: OnceCell::with_value(table),
        }
    }

    /// The resolved table, loading it on first use.
    pub fn table(&self) -> ConversionResult<&EnumTable> {
        self.table
            .get_or_try_init(|| self.resolver.resolve(&self.enum_id))
            .map_err(|reason| {
                DataTypeError::configuration(format!("enum '{}': {}", self.name, reason))
            })
    }

    /// Resolve the table now, reporting a broken table as a catalog error.
    pub fn preload(&self) -> Result<(), CatalogError> {
        self.table
            .get_or_try_init(|| self.resolver.resolve(&self.enum_id))
            .map(|_| ())
            .map_err(|reason| CatalogError::InvalidEnum {
                name: self.name.clone(),
                reason,
            })
    }

    fn lookup(&self, raw: &str) -> Result<i64, ValidationError> {
        let table = self
            .table()
            .map_err(|_| ValidationError::new(format!("{} has no values", self.name)))?;
        table.code_for(raw).ok_or_else(|| {
            let allowed: Vec<String> = table.entries().map(|(_, n)| n.to_lowercase()).collect();
            ValidationError::new(format!("expected one of: {}", allowed.join(", ")))
        })
    }

    fn code_of(&self, value: &ServerValue) -> ConversionResult<i64> {
        expect_server_value(self, value)?;
        value
            .as_int()
            .ok_or_else(|| DataTypeError::conversion("enum server value is not a code"))
    }
}

impl DataType for EnumType {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate_user_parameter_value(&self, raw: &str, _ctx: &ConversionContext) -> Validation {
        self.lookup(raw).map(|_| ())
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        _ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        Ok(ServerValue::Int(self.lookup(raw)?))
    }

    fn validate_user_json_value(&self, value: &Json, ctx: &ConversionContext) -> Validation {
        match value {
            Json::String(raw) => self.validate_user_parameter_value(raw, ctx),
            other => Err(ValidationError::new(format!(
                "expected a string, got {}",
                json_kind(other)
            ))),
        }
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        self.validate_user_json_value(value, ctx)?;
        self.convert_user_parameter_value_to_server_value(value.as_str().unwrap_or_default(), ctx)
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        let code = match value {
            Json::Number(n) => n.as_i64(),
            Json::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            DataTypeError::conversion(format!(
                "stored {} has unexpected value {}",
                self.name,
                describe(value)
            ))
        })?;

        if !self.table()?.contains_code(code) {
            return Err(DataTypeError::conversion(format!(
                "stored {} has unknown code {}",
                self.name, code
            )));
        }
        Ok(ServerValue::Int(code))
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        Ok(Json::from(self.code_of(value)?))
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        _ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        let code = self.code_of(value)?;
        let name = self.table()?.name_for(code).ok_or_else(|| {
            DataTypeError::conversion(format!("{} has no name for code {}", self.name, code))
        })?;
        Ok(Json::String(name.to_lowercase()))
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        match (value, self.table()) {
            (ServerValue::Int(code), Ok(table)) => table.contains_code(*code),
            _ => false,
        }
    }
}
