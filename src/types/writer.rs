//! Output sinks for API values.

use serde_json::{Map, Value as Json};

/// Receives named API values, e.g. a JSON or XML object writer.
pub trait ApiWriter {
    fn write_value(&mut self, name: &str, value: Json);

    fn write_null(&mut self, name: &str);
}

/// Writes into an in-memory JSON object.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JsonObjectWriter {
    object: Map<String, Json>,
}

impl JsonObjectWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_json(self) -> Json {
        Json::Object(self.object)
    }

    pub fn as_map(&self) -> &Map<String, Json> {
        &self.object
    }
}

impl ApiWriter for JsonObjectWriter {
    fn write_value(&mut self, name: &str, value: Json) {
        self.object.insert(name.to_string(), value);
    }

    fn write_null(&mut self, name: &str) {
        self.object.insert(name.to_string(), Json::Null);
    }
}
