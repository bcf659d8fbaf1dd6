//! Data types and the value conversion pipeline.
//!
//! Every field carries a [`DataType`] that moves values between four stages:
//!
//! ```text
//!   user parameter ─┐
//!                   ├─▶ server value ─▶ API value
//!   user JSON ──────┘        ▲
//!                            │
//!                     database value
//! ```
//!
//! Validation is separate from conversion: `validate_*` returns a
//! user-facing [`ValidationError`], while `convert_*` fails with an internal
//! [`DataTypeError`].

mod catalog;
mod collection;
mod composite;
pub mod csv;
mod enumeration;
mod error;
mod scalar;
mod temporal;
mod value;
mod writer;

pub use catalog::{CatalogBuilder, DataTypeCatalog, TypeExpr};
pub use collection::{ArrayType, MapType};
pub use composite::{
    BooleanOrStringType, OneOfType, PolymorphicBranch, PolymorphicType,
    RepresentationReferenceType,
};
pub use enumeration::{EnumResolver, EnumTable, EnumType, StaticEnumResolver};
pub use error::{CatalogError, ConversionResult, DataTypeError, Validation, ValidationError};
pub use scalar::{BooleanType, FloatType, IntegerType, StringType};
pub use temporal::{DateTimeType, DateType, TimeType};
pub use value::{json_kind, ServerValue};
pub use writer::{ApiWriter, JsonObjectWriter};

use crate::context::ConversionContext;
use serde_json::Value as Json;
use std::fmt;

/// How a type's values are structured, used by callers that need to treat
/// nested types differently from scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    Scalar,
    Array,
    Map,
    OneOf,
    /// Resolved by projecting a nested representation, not by conversion.
    Representation,
    Polymorphic,
}

/// A conversion and validation unit for one kind of value.
///
/// Implementations are immutable once built (enum tables are resolved at
/// most once) and are shared read-only across threads.
pub trait DataType: fmt::Debug + Send + Sync {
    /// Unique name within the catalog.
    fn name(&self) -> &str;

    fn shape(&self) -> TypeShape {
        TypeShape::Scalar
    }

    /// Validate a string-shaped input such as a query parameter.
    fn validate_user_parameter_value(&self, raw: &str, ctx: &ConversionContext) -> Validation;

    /// Convert a validated parameter to its server value. Fails with a
    /// conversion error if the input was not validated first.
    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue>;

    /// Validate an already-decoded JSON value.
    fn validate_user_json_value(&self, value: &Json, ctx: &ConversionContext) -> Validation;

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue>;

    /// Convert a stored value. Unexpected shapes are conversion errors.
    fn convert_database_value_to_server_value(&self, value: &Json)
        -> ConversionResult<ServerValue>;

    /// Convert a server value to its stored form. Most types store the same
    /// shape they read.
    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json>;

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        ctx: &ConversionContext,
    ) -> ConversionResult<Json>;

    fn convert_database_value_to_api_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        let server = self.convert_database_value_to_server_value(value)?;
        self.convert_server_value_to_api_value(&server, ctx)
    }

    /// Whether `value` has the shape this type produces as a server value.
    fn is_server_value_type(&self, value: &ServerValue) -> bool;

    /// Emit a named API value into `sink`. `None` is written as null.
    fn write_api_value(
        &self,
        sink: &mut dyn ApiWriter,
        ctx: &ConversionContext,
        name: &str,
        value: Option<&ServerValue>,
    ) -> ConversionResult<()> {
        match value {
            None => sink.write_null(name),
            Some(value) => {
                if !self.is_server_value_type(value) {
                    return Err(DataTypeError::conversion(format!(
                        "{} cannot write a {} server value",
                        self.name(),
                        value.kind()
                    )));
                }
                sink.write_value(name, self.convert_server_value_to_api_value(value, ctx)?);
            }
        }
        Ok(())
    }
}

/// Reject a value that does not match the expected server shape.
pub(crate) fn expect_server_value(
    data_type: &dyn DataType,
    value: &ServerValue,
) -> ConversionResult<()> {
    if data_type.is_server_value_type(value) {
        Ok(())
    } else {
        Err(DataTypeError::conversion(format!(
            "{} received a {} server value",
            data_type.name(),
            value.kind()
        )))
    }
}
