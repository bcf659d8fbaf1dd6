//! Types that combine or defer to other types.

use serde_json::{Map, Value as Json};
use std::sync::Arc;

use super::csv;
use super::error::{ConversionResult, DataTypeError, Validation, ValidationError};
use super::scalar::{BooleanType, StringType};
use super::value::{describe, json_kind, ServerValue};
use super::{DataType, TypeShape};
use crate::context::ConversionContext;

// =============================================================================
// One-of (scalar or list of that scalar)
// =============================================================================

/// Either a bare scalar or a homogeneous list of that scalar.
///
/// A parameter without a separator is always the bare scalar, never a
/// one-element list. A JSON list stays a list even with one element. An
/// empty JSON list or object cannot be told apart and is refused.
#[derive(Debug, Clone)]
pub struct OneOfType {
    name: String,
    inner: Arc<dyn DataType>,
}

impl OneOfType {
    pub fn new(inner: Arc<dyn DataType>) -> ConversionResult<Self> {
        if inner.shape() != TypeShape::Scalar {
            return Err(DataTypeError::configuration(format!(
                "one_of requires a scalar type, got {}",
                inner.name()
            )));
        }
        Ok(Self {
            name: format!("one_of<{}>", inner.name()),
            inner,
        })
    }

    pub fn inner(&self) -> &Arc<dyn DataType> {
        &self.inner
    }

    fn is_ambiguous(value: &Json) -> bool {
        match value {
            Json::Array(items) => items.is_empty(),
            Json::Object(entries) => entries.is_empty(),
            _ => false,
        }
    }

    fn ambiguous_error(&self) -> DataTypeError {
        DataTypeError::configuration(format!(
            "{} cannot decide between a scalar and a list for an empty value",
            self.name
        ))
    }

    fn parameter_items(raw: &str) -> Result<Vec<String>, ValidationError> {
        csv::parse_line(raw).map_err(|e| ValidationError::new(e.to_string()))
    }
}

impl DataType for OneOfType {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> TypeShape {
        TypeShape::OneOf
    }

    fn validate_user_parameter_value(&self, raw: &str, ctx: &ConversionContext) -> Validation {
        let items = Self::parameter_items(raw)?;
        for (i, item) in items.iter().enumerate() {
            self.inner
                .validate_user_parameter_value(item, ctx)
                .map_err(|e| if items.len() > 1 { e.at(i) } else { e })?;
        }
        Ok(())
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        self.validate_user_parameter_value(raw, ctx)?;
        let items = Self::parameter_items(raw)?;
        if !csv::has_separator(raw) {
            let bare = items.first().map(String::as_str).unwrap_or_default();
            return self.inner.convert_user_parameter_value_to_server_value(bare, ctx);
        }
        items
            .iter()
            .map(|item| self.inner.convert_user_parameter_value_to_server_value(item, ctx))
            .collect::<ConversionResult<Vec<_>>>()
            .map(ServerValue::List)
    }

    fn validate_user_json_value(&self, value: &Json, ctx: &ConversionContext) -> Validation {
        if Self::is_ambiguous(value) {
            return Err(ValidationError::new(format!(
                "an empty {} is not accepted here",
                json_kind(value)
            )));
        }
        match value {
            Json::Array(items) => {
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
            scalar => self.inner.validate_user_json_value(scalar, ctx),
        }
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        if Self::is_ambiguous(value) {
            return Err(self.ambiguous_error());
        }
        self.validate_user_json_value(value, ctx)?;
        match value {
            Json::Array(items) => items
                .iter()
                .map(|item| self.inner.convert_user_json_value_to_server_value(item, ctx))
                .collect::<ConversionResult<Vec<_>>>()
                .map(ServerValue::List),
            scalar => self.inner.convert_user_json_value_to_server_value(scalar, ctx),
        }
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        if Self::is_ambiguous(value) {
            return Err(self.ambiguous_error());
        }
        match value {
            Json::Array(items) => items
                .iter()
                .map(|item| self.inner.convert_database_value_to_server_value(item))
                .collect::<ConversionResult<Vec<_>>>()
                .map(ServerValue::List),
            scalar => self.inner.convert_database_value_to_server_value(scalar),
        }
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        match value {
            ServerValue::List(items) => items
                .iter()
                .map(|item| self.inner.convert_server_value_to_database_value(item))
                .collect::<ConversionResult<Vec<_>>>()
                .map(Json::Array),
            scalar => self.inner.convert_server_value_to_database_value(scalar),
        }
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        match value {
            ServerValue::List(items) => items
                .iter()
                .map(|item| self.inner.convert_server_value_to_api_value(item, ctx))
                .collect::<ConversionResult<Vec<_>>>()
                .map(Json::Array),
            scalar => self.inner.convert_server_value_to_api_value(scalar, ctx),
        }
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        match value {
            ServerValue::List(items) => items.iter().all(|i| self.inner.is_server_value_type(i)),
            scalar => self.inner.is_server_value_type(scalar),
        }
    }
}

// =============================================================================
// Boolean or string
// =============================================================================

/// A boolean when the input reads as one, otherwise a string.
#[derive(Debug, Clone, Default)]
pub struct BooleanOrStringType {
    boolean: BooleanType,
    string: StringType,
}

impl DataType for BooleanOrStringType {
    fn name(&self) -> &str {
        "boolean_or_string"
    }

    fn validate_user_parameter_value(&self, raw: &str, ctx: &ConversionContext) -> Validation {
        self.boolean
            .validate_user_parameter_value(raw, ctx)
            .or_else(|_| self.string.validate_user_parameter_value(raw, ctx))
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        if self.boolean.validate_user_parameter_value(raw, ctx).is_ok() {
            return self.boolean.convert_user_parameter_value_to_server_value(raw, ctx);
        }
        self.string.convert_user_parameter_value_to_server_value(raw, ctx)
    }

    fn validate_user_json_value(&self, value: &Json, ctx: &ConversionContext) -> Validation {
        self.boolean
            .validate_user_json_value(value, ctx)
            .or_else(|_| self.string.validate_user_json_value(value, ctx))
            .map_err(|_| {
                ValidationError::new(format!(
                    "expected a boolean or a string, got {}",
                    json_kind(value)
                ))
            })
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        if self.boolean.validate_user_json_value(value, ctx).is_ok() {
            return self.boolean.convert_user_json_value_to_server_value(value, ctx);
        }
        self.string.convert_user_json_value_to_server_value(value, ctx)
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        self.boolean
            .convert_database_value_to_server_value(value)
            .or_else(|_| self.string.convert_database_value_to_server_value(value))
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        match value {
            ServerValue::Bool(_) => self.boolean.convert_server_value_to_database_value(value),
            _ => self.string.convert_server_value_to_database_value(value),
        }
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        match value {
            ServerValue::Bool(_) => self.boolean.convert_server_value_to_api_value(value, ctx),
            _ => self.string.convert_server_value_to_api_value(value, ctx),
        }
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        self.boolean.is_server_value_type(value) || self.string.is_server_value_type(value)
    }
}

// =============================================================================
// Nested representations
// =============================================================================

fn not_directly_convertible(type_name: &str, operation: &'static str) -> DataTypeError {
    tracing::error!(
        data_type = type_name,
        operation,
        "nested representation type used as a scalar"
    );
    DataTypeError::unsupported(type_name, operation)
}

/// A field whose value is an embedded representation. Its values are
/// produced by projecting the representation's own fields, never by scalar
/// conversion.
#[derive(Debug, Clone)]
pub struct RepresentationReferenceType {
    name: String,
    representation: String,
}

impl RepresentationReferenceType {
    pub fn new(representation: impl Into<String>) -> Self {
        let representation = representation.into();
        Self {
            name: format!("ref<{}>", representation),
            representation,
        }
    }

    pub fn representation(&self) -> &str {
        &self.representation
    }
}

/// Direct conversions on nested representation types are programming errors.
macro_rules! nested_representation_conversions {
    () => {
        fn validate_user_parameter_value(&self, _raw: &str, _ctx: &ConversionContext) -> Validation {
            Err(ValidationError::new(format!(
                "{} cannot be passed as a parameter",
                self.name
            )))
        }

        fn convert_user_parameter_value_to_server_value(
            &self,
            _raw: &str,
            _ctx: &ConversionContext,
        ) -> ConversionResult<ServerValue> {
            Err(not_directly_convertible(&self.name, "parameter conversion"))
        }

        fn validate_user_json_value(&self, _value: &Json, _ctx: &ConversionContext) -> Validation {
            Err(ValidationError::new(format!(
                "{} must be validated through its representation",
                self.name
            )))
        }

        fn convert_user_json_value_to_server_value(
            &self,
            _value: &Json,
            _ctx: &ConversionContext,
        ) -> ConversionResult<ServerValue> {
            Err(not_directly_convertible(&self.name, "JSON conversion"))
        }

        fn convert_database_value_to_server_value(
            &self,
            _value: &Json,
        ) -> ConversionResult<ServerValue> {
            Err(not_directly_convertible(&self.name, "database conversion"))
        }

        fn convert_server_value_to_database_value(
            &self,
            _value: &ServerValue,
        ) -> ConversionResult<Json> {
            Err(not_directly_convertible(&self.name, "database conversion"))
        }

        fn convert_server_value_to_api_value(
            &self,
            _value: &ServerValue,
            _ctx: &ConversionContext,
        ) -> ConversionResult<Json> {
            Err(not_directly_convertible(&self.name, "API conversion"))
        }

        fn is_server_value_type(&self, value: &ServerValue) -> bool {
            matches!(value, ServerValue::Map(_))
        }
    };
}

impl DataType for RepresentationReferenceType {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> TypeShape {
        TypeShape::Representation
    }

    nested_representation_conversions!();
}

/// One branch of a polymorphic type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolymorphicBranch {
    /// Discriminator value selecting this branch.
    pub value: String,
    /// Representation projected for this branch.
    pub representation: String,
}

/// A nested representation chosen per record by a discriminator field.
#[derive(Debug, Clone)]
pub struct PolymorphicType {
    name: String,
    discriminator: String,
    branches: Vec<PolymorphicBranch>,
}

impl PolymorphicType {
    pub fn new(
        name: impl Into<String>,
        discriminator: impl Into<String>,
        branches: Vec<PolymorphicBranch>,
    ) -> ConversionResult<Self> {
        let name = name.into();
        if branches.is_empty() {
            return Err(DataTypeError::configuration(format!("{} has no branches", name)));
        }
        for (i, branch) in branches.iter().enumerate() {
            if branches[..i].iter().any(|b| b.value == branch.value) {
                return Err(DataTypeError::configuration(format!(
                    "{} declares branch '{}' twice",
                    name, branch.value
                )));
            }
        }
        Ok(Self {
            name,
            discriminator: discriminator.into(),
            branches,
        })
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    pub fn branches(&self) -> &[PolymorphicBranch] {
        &self.branches
    }

    /// Pick the branch for a raw record by its discriminator value. Exactly
    /// one branch must match.
    pub fn resolve_branch(&self, record: &Map<String, Json>) -> ConversionResult<&PolymorphicBranch> {
        let raw = record.get(&self.discriminator).ok_or_else(|| {
            DataTypeError::conversion(format!(
                "{} record has no '{}' discriminator",
                self.name, self.discriminator
            ))
        })?;
        let key = match raw {
            Json::String(s) => s.clone(),
            Json::Number(n) => n.to_string(),
            other => {
                return Err(DataTypeError::conversion(format!(
                    "{} discriminator has unexpected value {}",
                    self.name,
                    describe(other)
                )))
            }
        };

        let mut matches = self.branches.iter().filter(|b| b.value == key);
        match (matches.next(), matches.next()) {
            (Some(branch), None) => Ok(branch),
            (None, _) => Err(DataTypeError::conversion(format!(
                "{} has no branch for discriminator {}",
                self.name,
                describe(raw)
            ))),
            (Some(_), Some(_)) => Err(DataTypeError::configuration(format!(
                "{} has several branches for discriminator {}",
                self.name,
                describe(raw)
            ))),
        }
    }
}

impl DataType for PolymorphicType {
    fn name(&self) -> &str {
        &self.name
    }

    fn shape(&self) -> TypeShape {
        TypeShape::Polymorphic
    }

    nested_representation_conversions!();
}
