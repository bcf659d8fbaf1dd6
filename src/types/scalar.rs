//! Primitive scalar types: boolean, integer, float and string.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value as Json};

use super::error::{ConversionResult, DataTypeError, Validation, ValidationError};
use super::value::{describe, json_kind, ServerValue};
use super::{expect_server_value, DataType};
use crate::context::ConversionContext;

static INTEGER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());
static FLOAT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap());

// =============================================================================
// Boolean
// =============================================================================

/// Booleans. Storage may hold a native boolean, `0`/`1` or `"0"`/`"1"`;
/// JSON input must be a real `true`/`false`.
#[derive(Debug, Clone, Default)]
pub struct BooleanType;

impl BooleanType {
    fn parse_parameter(raw: &str) -> Option<bool> {
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}

impl DataType for BooleanType {
    fn name(&self) -> &str {
        "boolean"
    }

    fn validate_user_parameter_value(&self, raw: &str, _ctx: &ConversionContext) -> Validation {
        match Self::parse_parameter(raw) {
            Some(_) => Ok(()),
            None => Err(ValidationError::new(
                "expected a boolean (true, false, 1 or 0)",
            )),
        }
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        _ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        Self::parse_parameter(raw)
            .map(ServerValue::Bool)
            .ok_or_else(|| DataTypeError::conversion(format!("'{}' is not a boolean", raw)))
    }

    fn validate_user_json_value(&self, value: &Json, _ctx: &ConversionContext) -> Validation {
        match value {
            Json::Bool(_) => Ok(()),
            other => Err(ValidationError::new(format!(
                "expected true or false, got {}",
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
        Ok(ServerValue::Bool(value.as_bool().unwrap_or_default()))
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        let b = match value {
            Json::Bool(b) => *b,
            Json::Number(n) if n.as_i64() == Some(0) => false,
            Json::Number(n) if n.as_i64() == Some(1) => true,
            Json::String(s) if s == "0" => false,
            Json::String(s) if s == "1" => true,
            other => {
                return Err(DataTypeError::conversion(format!(
                    "stored boolean has unexpected value {}",
                    describe(other)
                )))
            }
        };
        Ok(ServerValue::Bool(b))
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        expect_server_value(self, value)?;
        Ok(Json::from(u8::from(value.as_bool().unwrap_or_default())))
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        _ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        expect_server_value(self, value)?;
        Ok(Json::Bool(value.as_bool().unwrap_or_default()))
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        matches!(value, ServerValue::Bool(_))
    }
}

// =============================================================================
// Integer
// =============================================================================

/// 64-bit signed integers.
#[derive(Debug, Clone, Default)]
pub struct IntegerType;

impl IntegerType {
    fn parse_parameter(raw: &str) -> Option<i64> {
        if !INTEGER_PATTERN.is_match(raw) {
            return None;
        }
        raw.trim_start_matches('+').parse().ok()
    }
}

impl DataType for IntegerType {
    fn name(&self) -> &str {
        "integer"
    }

    fn validate_user_parameter_value(&self, raw: &str, _ctx: &ConversionContext) -> Validation {
        match Self::parse_parameter(raw) {
            Some(_) => Ok(()),
            None => Err(ValidationError::new("expected an integer")),
        }
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        _ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        Self::parse_parameter(raw)
            .map(ServerValue::Int)
            .ok_or_else(|| DataTypeError::conversion(format!("'{}' is not an integer", raw)))
    }

    fn validate_user_json_value(&self, value: &Json, _ctx: &ConversionContext) -> Validation {
        match value.as_i64() {
            Some(_) => Ok(()),
            None => Err(ValidationError::new(format!(
                "expected an integer, got {}",
                json_kind(value)
            ))),
        }
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        self.validate_user_json_value(value, ctx)?;
        Ok(ServerValue::Int(value.as_i64().unwrap_or_default()))
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        let parsed = match value {
            Json::Number(n) => n.as_i64(),
            Json::String(s) => Self::parse_parameter(s.trim()),
            _ => None,
        };
        parsed.map(ServerValue::Int).ok_or_else(|| {
            DataTypeError::conversion(format!("stored integer has unexpected value {}", describe(value)))
        })
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        expect_server_value(self, value)?;
        Ok(Json::from(value.as_int().unwrap_or_default()))
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        _ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        expect_server_value(self, value)?;
        Ok(Json::from(value.as_int().unwrap_or_default()))
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        matches!(value, ServerValue::Int(_))
    }
}

// =============================================================================
// Float
// =============================================================================

/// Finite double precision numbers.
#[derive(Debug, Clone, Default)]
pub struct FloatType;

impl FloatType {
    fn parse_parameter(raw: &str) -> Option<f64> {
        if !FLOAT_PATTERN.is_match(raw) {
            return None;
        }
        raw.parse::<f64>().ok().filter(|f| f.is_finite())
    }

    fn float_of(value: &ServerValue) -> ConversionResult<f64> {
        match value {
            ServerValue::Float(f) => Ok(*f),
            other => Err(DataTypeError::conversion(format!(
                "float received a {} server value",
                other.kind()
            ))),
        }
    }

    fn to_number(f: f64) -> ConversionResult<Json> {
        Number::from_f64(f)
            .map(Json::Number)
            .ok_or_else(|| DataTypeError::conversion("float is not finite"))
    }
}

impl DataType for FloatType {
    fn name(&self) -> &str {
        "float"
    }

    fn validate_user_parameter_value(&self, raw: &str, _ctx: &ConversionContext) -> Validation {
        match Self::parse_parameter(raw) {
            Some(_) => Ok(()),
            None => Err(ValidationError::new("expected a number")),
        }
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        _ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        Self::parse_parameter(raw)
            .map(ServerValue::Float)
            .ok_or_else(|| DataTypeError::conversion(format!("'{}' is not a number", raw)))
    }

    fn validate_user_json_value(&self, value: &Json, _ctx: &ConversionContext) -> Validation {
        match value.as_f64() {
            Some(f) if f.is_finite() => Ok(()),
            _ => Err(ValidationError::new(format!(
                "expected a number, got {}",
                json_kind(value)
            ))),
        }
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        self.validate_user_json_value(value, ctx)?;
        Ok(ServerValue::Float(value.as_f64().unwrap_or_default()))
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        let parsed = match value {
            Json::Number(n) => n.as_f64(),
            Json::String(s) => Self::parse_parameter(s.trim()),
            _ => None,
        };
        parsed
            .filter(|f| f.is_finite())
            .map(ServerValue::Float)
            .ok_or_else(|| {
                DataTypeError::conversion(format!("stored float has unexpected value {}", describe(value)))
            })
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        Self::to_number(Self::float_of(value)?)
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        _ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        Self::to_number(Self::float_of(value)?)
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        matches!(value, ServerValue::Float(f) if f.is_finite())
    }
}

// =============================================================================
// String
// =============================================================================

/// UTF-8 strings. Stored numbers are read back as their decimal text.
#[derive(Debug, Clone, Default)]
pub struct StringType;

impl DataType for StringType {
    fn name(&self) -> &str {
        "string"
    }

    fn validate_user_parameter_value(&self, _raw: &str, _ctx: &ConversionContext) -> Validation {
        Ok(())
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        _ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        Ok(ServerValue::String(raw.to_string()))
    }

    fn validate_user_json_value(&self, value: &Json, _ctx: &ConversionContext) -> Validation {
        match value {
            Json::String(_) => Ok(()),
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
        Ok(ServerValue::String(value.as_str().unwrap_or_default().to_string()))
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        match value {
            Json::String(s) => Ok(ServerValue::String(s.clone())),
            Json::Number(n) => Ok(ServerValue::String(n.to_string())),
            other => Err(DataTypeError::conversion(format!(
                "stored string has unexpected value {}",
                describe(other)
            ))),
        }
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        expect_server_value(self, value)?;
        Ok(Json::String(value.as_str().unwrap_or_default().to_string()))
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        _ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        expect_server_value(self, value)?;
        Ok(Json::String(value.as_str().unwrap_or_default().to_string()))
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        matches!(value, ServerValue::String(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ApiVersion, ConversionContext};
    use serde_json::json;

    fn ctx() -> ConversionContext {
        ConversionContext::new(ApiVersion::LATEST, chrono_tz::Tz::UTC)
    }

    #[test]
    fn test_boolean_storage_forms() {
        let t = BooleanType;
        for stored in [json!(1), json!("1"), json!(true)] {
            assert_eq!(
                t.convert_database_value_to_server_value(&stored).unwrap(),
                ServerValue::Bool(true)
            );
        }
        for stored in [json!(0), json!("0"), json!(false)] {
            assert_eq!(
                t.convert_database_value_to_server_value(&stored).unwrap(),
                ServerValue::Bool(false)
            );
        }
        assert!(t.convert_database_value_to_server_value(&json!(2)).is_err());
        assert!(t.convert_database_value_to_server_value(&json!("yes")).is_err());
    }

    #[test]
    fn test_boolean_json_is_strict() {
        let t = BooleanType;
        assert!(t.validate_user_json_value(&json!(true), &ctx()).is_ok());
        assert!(t.validate_user_json_value(&json!(1), &ctx()).is_err());
        assert!(t.validate_user_json_value(&json!("true"), &ctx()).is_err());
    }

    #[test]
    fn test_integer_parameter() {
        let t = IntegerType;
        assert!(t.validate_user_parameter_value("-42", &ctx()).is_ok());
        assert!(t.validate_user_parameter_value("4.2", &ctx()).is_err());
        assert!(t.validate_user_parameter_value("99999999999999999999", &ctx()).is_err());
        assert_eq!(
            t.convert_user_parameter_value_to_server_value("+7", &ctx()).unwrap(),
            ServerValue::Int(7)
        );
    }

    #[test]
    fn test_integer_rejects_float_json() {
        assert!(IntegerType.validate_user_json_value(&json!(1.5), &ctx()).is_err());
    }

    #[test]
    fn test_float_api_value() {
        let t = FloatType;
        let server = t.convert_database_value_to_server_value(&json!("2.5")).unwrap();
        assert_eq!(t.convert_server_value_to_api_value(&server, &ctx()).unwrap(), json!(2.5));
        assert!(t.validate_user_parameter_value("nan", &ctx()).is_err());
    }

    #[test]
    fn test_string_reads_stored_numbers() {
        assert_eq!(
            StringType.convert_database_value_to_server_value(&json!(12)).unwrap(),
            ServerValue::from("12")
        );
        assert!(StringType.convert_database_value_to_server_value(&json!([1])).is_err());
    }

    #[test]
    fn test_server_type_guard() {
        assert!(StringType
            .convert_server_value_to_api_value(&ServerValue::Int(1), &ctx())
            .is_err());
    }
}
