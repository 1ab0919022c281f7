//! The `data_schema_version` pseudo-attribute.
//!
//! Always serialized as the version the code declares, so every write brings
//! stored data up to date. On load, a stored version different from the code
//! version runs the schema's fixup hook (see `SchemaBuilder::schema_version`).

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options};
use crate::model::Value;
use crate::Result;

pub const SCHEMA_VERSION_ATTRIBUTE: &str = "data_schema_version";

#[derive(Debug)]
pub struct SchemaVersionHandler {
    options: Options,
    code_version: String,
}

impl SchemaVersionHandler {
    pub fn new(code_version: impl Into<String>) -> Self {
        Self { options: Options::new(), code_version: code_version.into() }
    }

    pub fn code_version(&self) -> &str { &self.code_version }

    fn coerce(value: Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

impl AttributeHandler for SchemaVersionHandler {
    fn name(&self) -> &str { SCHEMA_VERSION_ATTRIBUTE }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        Ok(Self::coerce(value))
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        Ok(Self::coerce(Value::from(stored.clone())))
    }

    fn to_store(&self, _value: &Value) -> Result<JsonValue> {
        Ok(JsonValue::String(self.code_version.clone()))
    }

    fn is_schema_version(&self) -> bool {
        true
    }
}
