//! Integer attributes.

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options, wrong_type};
use crate::model::Value;
use crate::Result;

#[derive(Debug)]
pub struct IntegerHandler {
    name: String,
    options: Options,
}

impl IntegerHandler {
    pub fn new(name: &str, options: Options) -> Result<Self> {
        options.assert_valid_keys("integer", name, &[])?;
        Ok(Self { name: name.to_owned(), options })
    }

    fn coerce(&self, value: &Value) -> Result<Value> {
        Ok(match value {
            Value::Null => Value::Null,
            Value::Int(i) => Value::Int(*i),
            Value::Float(f) => Value::Int(f.trunc() as i64),
            Value::Decimal(d) => Value::Int(leading_integer(&d.with_scale(0).to_string())),
            Value::String(s) => Value::Int(leading_integer(s)),
            other => return Err(wrong_type(&self.name, other)),
        })
    }
}

/// Optional whitespace, optional sign, digits; anything else reads as 0.
pub(crate) fn leading_integer(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit() && c != '_').unwrap_or(digits.len());
    let number: String = digits[..end].chars().filter(|c| *c != '_').collect();
    let magnitude = number.parse::<i64>().unwrap_or(0);
    if negative { -magnitude } else { magnitude }
}

impl AttributeHandler for IntegerHandler {
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
            Value::Int(i) => JsonValue::from(i),
            _ => JsonValue::Null,
        })
    }
}
