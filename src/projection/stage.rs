//! Per-leaf conversion used by each output stage.

use std::fmt;

use serde_json::Value as Json;

use crate::context::ConversionContext;
use crate::types::{ConversionResult, DataType, ServerValue};

/// Converts database-stage leaves into one output stage.
pub trait Stage {
    type Output: fmt::Debug + Clone;

    fn name(&self) -> &'static str;

    fn convert(&self, data_type: &dyn DataType, value: &Json) -> ConversionResult<Self::Output>;

    /// Emit a polymorphic discriminator value as-is.
    fn discriminator(&self, value: &str) -> Self::Output;
}

/// Database → server values. Never looks at the conversion context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerStage;

impl Stage for ServerStage {
    type Output = ServerValue;

    fn name(&self) -> &'static str {
        "server"
    }

    fn convert(&self, data_type: &dyn DataType, value: &Json) -> ConversionResult<ServerValue> {
        data_type.convert_database_value_to_server_value(value)
    }

    fn discriminator(&self, value: &str) -> ServerValue {
        ServerValue::String(value.to_string())
    }
}

/// Database → API values, formatted for the context's version and timezone.
#[derive(Debug, Clone, Copy)]
pub struct ApiStage<'c> {
    ctx: &'c ConversionContext,
}

impl<'c> ApiStage<'c> {
    pub fn new(ctx: &'c ConversionContext) -> Self {
        Self { ctx }
    }
}

impl Stage for ApiStage<'_> {
    type Output = Json;

    fn name(&self) -> &'static str {
        "api"
    }

    fn convert(&self, data_type: &dyn DataType, value: &Json) -> ConversionResult<Json> {
        data_type.convert_database_value_to_api_value(value, self.ctx)
    }

    fn discriminator(&self, value: &str) -> Json {
        Json::String(value.to_string())
    }
}
