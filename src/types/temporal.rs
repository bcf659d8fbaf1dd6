//! Calendar types: date, time of day, and datetime.
//!
//! Dates and times use fixed `Y-m-d` / `H:i:s` shapes in every stage.
//! Datetimes fork on the API version: from [`ApiVersion::STRICT_DATETIME`]
//! onward input and output are RFC3339, keeping the caller's offset on input
//! and rendering in the context timezone on output. Older versions accept
//! looser input, always normalise to the context timezone, and render without
//! an offset. The fork is part of the wire contract.
//!
//! [`ApiVersion::STRICT_DATETIME`]: crate::context::ApiVersion::STRICT_DATETIME

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as Json;

use super::error::{ConversionResult, DataTypeError, Validation, ValidationError};
use super::value::{describe, json_kind, ServerValue};
use super::{expect_server_value, DataType};
use crate::context::ConversionContext;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S";
const STORAGE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const API_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
const LEGACY_API_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}$").unwrap());
static STORED_TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}:\d{2}:\d{2})(\.\d+)?$").unwrap());
static RFC3339_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$").unwrap()
});

fn string_input<'a>(value: &'a Json, expected: &str) -> Result<&'a str, ValidationError> {
    value.as_str().ok_or_else(|| {
        ValidationError::new(format!("expected {}, got {}", expected, json_kind(value)))
    })
}

fn stored_string<'a>(value: &'a Json, type_name: &str) -> ConversionResult<&'a str> {
    value.as_str().ok_or_else(|| {
        DataTypeError::conversion(format!(
            "stored {} has unexpected value {}",
            type_name,
            describe(value)
        ))
    })
}

// =============================================================================
// Date
// =============================================================================

/// Calendar dates in `Y-m-d` form.
#[derive(Debug, Clone, Default)]
pub struct DateType;

impl DateType {
    fn parse(raw: &str) -> Option<NaiveDate> {
        if !DATE_PATTERN.is_match(raw) {
            return None;
        }
        NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
    }

    fn date_of(value: &ServerValue) -> ConversionResult<NaiveDate> {
        match value {
            ServerValue::Date(d) => Ok(*d),
            other => Err(DataTypeError::conversion(format!(
                "date received a {} server value",
                other.kind()
            ))),
        }
    }
}

impl DataType for DateType {
    fn name(&self) -> &str {
        "date"
    }

    fn validate_user_parameter_value(&self, raw: &str, _ctx: &ConversionContext) -> Validation {
        match Self::parse(raw) {
            Some(_) => Ok(()),
            None => Err(ValidationError::new("expected a date formatted as YYYY-MM-DD")),
        }
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        _ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        Self::parse(raw)
            .map(ServerValue::Date)
            .ok_or_else(|| DataTypeError::conversion(format!("'{}' is not a date", raw)))
    }

    fn validate_user_json_value(&self, value: &Json, ctx: &ConversionContext) -> Validation {
        let raw = string_input(value, "a date string")?;
        self.validate_user_parameter_value(raw, ctx)
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        let raw = string_input(value, "a date string")?;
        self.convert_user_parameter_value_to_server_value(raw, ctx)
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        let raw = stored_string(value, "date")?;
        Self::parse(raw).map(ServerValue::Date).ok_or_else(|| {
            DataTypeError::conversion(format!("stored date has unexpected value {}", describe(value)))
        })
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        Ok(Json::String(Self::date_of(value)?.format(DATE_FORMAT).to_string()))
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        _ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        Ok(Json::String(Self::date_of(value)?.format(DATE_FORMAT).to_string()))
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        matches!(value, ServerValue::Date(_))
    }
}

// =============================================================================
// Time
// =============================================================================

/// Times of day in `H:i:s` form. Storage may carry sub-second digits, which
/// are truncated.
#[derive(Debug, Clone, Default)]
pub struct TimeType;

impl TimeType {
    fn parse(raw: &str) -> Option<NaiveTime> {
        if !TIME_PATTERN.is_match(raw) {
            return None;
        }
        NaiveTime::parse_from_str(raw, TIME_FORMAT).ok()
    }

    fn time_of(value: &ServerValue) -> ConversionResult<NaiveTime> {
        match value {
            ServerValue::Time(t) => Ok(*t),
            other => Err(DataTypeError::conversion(format!(
                "time received a {} server value",
                other.kind()
            ))),
        }
    }
}

impl DataType for TimeType {
    fn name(&self) -> &str {
        "time"
    }

    fn validate_user_parameter_value(&self, raw: &str, _ctx: &ConversionContext) -> Validation {
        match Self::parse(raw) {
            Some(_) => Ok(()),
            None => Err(ValidationError::new("expected a time formatted as HH:MM:SS")),
        }
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        _ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        Self::parse(raw)
            .map(ServerValue::Time)
            .ok_or_else(|| DataTypeError::conversion(format!("'{}' is not a time", raw)))
    }

    fn validate_user_json_value(&self, value: &Json, ctx: &ConversionContext) -> Validation {
        let raw = string_input(value, "a time string")?;
        self.validate_user_parameter_value(raw, ctx)
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        let raw = string_input(value, "a time string")?;
        self.convert_user_parameter_value_to_server_value(raw, ctx)
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        let raw = stored_string(value, "time")?;
        STORED_TIME_PATTERN
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|whole_seconds| Self::parse(whole_seconds.as_str()))
            .map(ServerValue::Time)
            .ok_or_else(|| {
                DataTypeError::conversion(format!("stored time has unexpected value {}", describe(value)))
            })
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        Ok(Json::String(Self::time_of(value)?.format(TIME_FORMAT).to_string()))
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        _ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        Ok(Json::String(Self::time_of(value)?.format(TIME_FORMAT).to_string()))
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        matches!(value, ServerValue::Time(_))
    }
}

// =============================================================================
// DateTime
// =============================================================================

/// Instants. Stored as UTC `Y-m-d H:i:s`; the API form depends on the
/// context version and timezone.
#[derive(Debug, Clone, Default)]
pub struct DateTimeType;

impl DateTimeType {
    /// Parse caller input according to the context version.
    fn parse_input(raw: &str, ctx: &ConversionContext) -> Option<DateTime<FixedOffset>> {
        if ctx.version().uses_strict_datetime() {
            if !RFC3339_PATTERN.is_match(raw) {
                return None;
            }
            return DateTime::parse_from_rfc3339(raw).ok();
        }

        let tz = ctx.timezone();
        let parsed = match DateTime::parse_from_rfc3339(raw) {
            Ok(dt) => Some(dt.with_timezone(&tz)),
            Err(_) => Self::parse_naive(raw).and_then(|naive| tz.from_local_datetime(&naive).earliest()),
        };
        parsed.map(|dt| dt.fixed_offset())
    }

    fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
        ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .or_else(|| DateType::parse(raw).and_then(|date| date.and_hms_opt(0, 0, 0)))
    }

    fn datetime_of(value: &ServerValue) -> ConversionResult<DateTime<FixedOffset>> {
        match value {
            ServerValue::DateTime(dt) => Ok(*dt),
            other => Err(DataTypeError::conversion(format!(
                "datetime received a {} server value",
                other.kind()
            ))),
        }
    }

    fn invalid_message(ctx: &ConversionContext) -> &'static str {
        if ctx.version().uses_strict_datetime() {
            "expected an RFC3339 datetime such as 2024-01-31T13:45:00+00:00"
        } else {
            "expected a datetime such as 2024-01-31 13:45:00"
        }
    }

    /// Render an instant in the context timezone using the version's output
    /// format.
    pub fn format_for_api(dt: &DateTime<FixedOffset>, ctx: &ConversionContext) -> String {
        let local = dt.with_timezone(&ctx.timezone());
        if ctx.version().uses_strict_datetime() {
            local.format(API_DATETIME_FORMAT).to_string()
        } else {
            local.format(LEGACY_API_DATETIME_FORMAT).to_string()
        }
    }
}

impl DataType for DateTimeType {
    fn name(&self) -> &str {
        "datetime"
    }

    fn validate_user_parameter_value(&self, raw: &str, ctx: &ConversionContext) -> Validation {
        match Self::parse_input(raw, ctx) {
            Some(_) => Ok(()),
            None => Err(ValidationError::new(Self::invalid_message(ctx))),
        }
    }

    fn convert_user_parameter_value_to_server_value(
        &self,
        raw: &str,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        Self::parse_input(raw, ctx)
            .map(ServerValue::DateTime)
            .ok_or_else(|| DataTypeError::conversion(format!("'{}' is not a datetime", raw)))
    }

    fn validate_user_json_value(&self, value: &Json, ctx: &ConversionContext) -> Validation {
        let raw = string_input(value, "a datetime string")?;
        self.validate_user_parameter_value(raw, ctx)
    }

    fn convert_user_json_value_to_server_value(
        &self,
        value: &Json,
        ctx: &ConversionContext,
    ) -> ConversionResult<ServerValue> {
        let raw = string_input(value, "a datetime string")?;
        self.convert_user_parameter_value_to_server_value(raw, ctx)
    }

    fn convert_database_value_to_server_value(
        &self,
        value: &Json,
    ) -> ConversionResult<ServerValue> {
        let raw = stored_string(value, "datetime")?;
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
            .map(|naive| ServerValue::DateTime(Utc.from_utc_datetime(&naive).fixed_offset()))
            .map_err(|_| {
                DataTypeError::conversion(format!(
                    "stored datetime has unexpected value {}",
                    describe(value)
                ))
            })
    }

    fn convert_server_value_to_database_value(&self, value: &ServerValue) -> ConversionResult<Json> {
        let dt = Self::datetime_of(value)?;
        Ok(Json::String(
            dt.with_timezone(&Utc).format(STORAGE_DATETIME_FORMAT).to_string(),
        ))
    }

    fn convert_server_value_to_api_value(
        &self,
        value: &ServerValue,
        ctx: &ConversionContext,
    ) -> ConversionResult<Json> {
        expect_server_value(self, value)?;
        let dt = Self::datetime_of(value)?;
        Ok(Json::String(Self::format_for_api(&dt, ctx)))
    }

    fn is_server_value_type(&self, value: &ServerValue) -> bool {
        matches!(value, ServerValue::DateTime(_))
    }
}
