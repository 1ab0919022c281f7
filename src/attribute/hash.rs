//! Free-form hash attributes.
//!
//! Values are JSON objects. They are stored as JSON text unless
//! `store_hash_as_json(false)` is given, or the schema stores into
//! Elasticsearch and the option is not set explicitly.

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options, wrong_type};
use crate::model::{JsonMap, Value};
use crate::Result;

#[derive(Debug)]
pub struct HashHandler {
    name: String,
    options: Options,
}

impl HashHandler {
    pub const OPTIONS: &'static [&'static str] = &["store_hash_as_json"];

    pub fn new(name: &str, options: Options) -> Result<Self> {
        options.assert_valid_keys("hash", name, Self::OPTIONS)?;
        Ok(Self { name: name.to_owned(), options })
    }

    fn store_as_json(&self) -> bool {
        self.options.store_hash_as_json.unwrap_or(!self.options.is_elasticsearch())
    }

    fn to_map(&self, value: &Value) -> Result<JsonMap> {
        match value {
            Value::Null => Ok(JsonMap::new()),
            Value::String(s) if s.trim().is_empty() => Ok(JsonMap::new()),
            Value::String(s) => match serde_json::from_str::<JsonValue>(s)? {
                JsonValue::Object(map) => Ok(map),
                JsonValue::Null => Ok(JsonMap::new()),
                _ => Err(wrong_type(&self.name, value)),
            },
            Value::Map(map) => Ok(map.clone()),
            Value::Aggregate(aggregate) => aggregate.to_store(),
            other => Err(wrong_type(&self.name, other)),
        }
    }
}

impl AttributeHandler for HashHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        self.to_map(&value).map(Value::Map)
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        match stored {
            JsonValue::Object(map) => Ok(Value::Map(map.clone())),
            other => self.from_value(Value::from(other.clone())),
        }
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        if self.store_as_json() {
            if let Value::String(s) = value {
                if !s.trim().is_empty() {
                    return Ok(JsonValue::String(s.clone()));
                }
            }
            let map = self.to_map(value)?;
            Ok(JsonValue::String(serde_json::to_string(&map)?))
        } else {
            Ok(JsonValue::Object(self.to_map(value)?))
        }
    }

    /// A fresh map per call, so instances never share one.
    fn default(&self) -> Value {
        match self.options.default_value() {
            Value::Null => Value::Map(JsonMap::new()),
            declared => declared,
        }
    }
}
