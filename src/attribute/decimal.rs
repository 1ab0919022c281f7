//! Arbitrary precision decimal attributes, stored as strings.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options};
use crate::model::Value;
use crate::Result;

#[derive(Debug)]
pub struct DecimalHandler {
    name: String,
    options: Options,
}

impl DecimalHandler {
    pub const OPTIONS: &'static [&'static str] = &["scale"];

    pub fn new(name: &str, options: Options) -> Result<Self> {
        options.assert_valid_keys("decimal", name, Self::OPTIONS)?;
        Ok(Self { name: name.to_owned(), options })
    }

    /// Anything unparseable reads as zero; `scale` truncates toward zero.
    fn load(&self, value: &Value) -> BigDecimal {
        let decimal = match value {
            Value::Decimal(d) => d.clone(),
            Value::Int(i) => BigDecimal::from(*i),
            Value::Float(f) => BigDecimal::from_str(&f.to_string()).unwrap_or_default(),
            Value::String(s) => BigDecimal::from_str(s.trim()).unwrap_or_default(),
            _ => BigDecimal::default(),
        };
        match self.options.scale {
            Some(scale) if decimal.as_bigint_and_exponent().1 > scale => decimal.with_scale(scale),
            _ => decimal,
        }
    }
}

impl AttributeHandler for DecimalHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(Value::Decimal(self.load(&value)))
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        self.from_value(Value::from(stored.clone()))
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        if value.is_null() {
            return Ok(JsonValue::Null);
        }
        Ok(JsonValue::String(self.load(value).to_string()))
    }
}
