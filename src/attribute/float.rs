//! Float attributes.

use std::str::FromStr;

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options, wrong_type};
use crate::model::Value;
use crate::Result;

#[derive(Debug)]
pub struct FloatHandler {
    name: String,
    options: Options,
}

impl FloatHandler {
    pub fn new(name: &str, options: Options) -> Result<Self> {
        options.assert_valid_keys("float", name, &[])?;
        Ok(Self { name: name.to_owned(), options })
    }

    fn coerce(&self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::Null => Value::Null,
            Value::Float(f) => Value::Float(*f),
            Value::Int(i) => Value::Float(*i as f64),
            Value::Decimal(d) => Value::Float(leading_float(&d.to_string())),
            Value::String(s) => Value::Float(leading_float(s)),
            other => return Err(wrong_type(&self.name, other)),
        })
    }
}

/// Longest numeric prefix of `text`; 0.0 when there is none.
pub(crate) fn leading_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    let bytes = trimmed.as_bytes();
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 || matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_exp => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exp => seen_exp = true,
            _ => break,
        }
        end += 1;
    }
    // Back off until the prefix parses, e.g. "1e" or "-".
    while end > 0 {
        if let Ok(number) = f64::from_str(&trimmed[..end]) {
            return number;
        }
        end -= 1;
    }
    0.0
}

impl AttributeHandler for FloatHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        self.coerce(&value)
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        self.coerce(&Value::from(stored.clone()))
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        Ok(match self.coerce(value)? {
            Value::Float(f) => JsonValue::from(f),
            _ => JsonValue::Null,
        })
    }
}
