//! String attributes, optionally encrypted at rest.

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options, ValidationErrors, common_validation};
use crate::encryption;
use crate::model::Value;
use crate::Result;

#[derive(Debug)]
pub struct StringHandler {
    name: String,
    options: Options,
}

impl StringHandler {
    pub const OPTIONS: &'static [&'static str] = &["size", "encrypted"];

    pub fn new(name: &str, options: Options) -> Result<Self> {
        options.assert_valid_keys("string", name, Self::OPTIONS)?;
        Ok(Self { name: name.to_owned(), options })
    }

    fn coerce(value: Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}

impl AttributeHandler for StringHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        Ok(Self::coerce(value))
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        match stored {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::String(s) if self.options.encrypted => {
                Ok(Value::String(encryption::decrypt(&self.name, s)?))
            }
            JsonValue::String(s) => Ok(Value::String(s.clone())),
            other => Ok(Value::String(other.to_string())),
        }
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        match Self::coerce(value.clone()) {
            Value::String(s) if self.options.encrypted => {
                Ok(JsonValue::String(encryption::encrypt(&self.name, &s)?))
            }
            Value::String(s) => Ok(JsonValue::String(s)),
            _ => Ok(JsonValue::Null),
        }
    }

    fn validation_errors(&self, value: &Value) -> ValidationErrors {
        let mut errors = common_validation(&self.options, value);
        if let (Some(size), Value::String(s)) = (self.options.size, value) {
            if s.chars().count() > size {
                errors.push(format!("is too long (maximum is {size} characters)"));
            }
        }
        errors
    }
}
