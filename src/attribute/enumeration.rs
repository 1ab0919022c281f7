//! Enum attributes: values are symbols, stored as their names.

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options, wrong_type};
use crate::model::Value;
use crate::Result;

#[derive(Debug)]
pub struct EnumHandler {
    name: String,
    options: Options,
}

impl EnumHandler {
    pub fn new(name: &str, options: Options) -> Result<Self> {
        options.assert_valid_keys("enum", name, &[])?;
        Ok(Self { name: name.to_owned(), options })
    }

    fn coerce(&self, value: &Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) | Value::Symbol(s) if s.trim().is_empty() => Ok(Value::Null),
            Value::String(s) | Value::Symbol(s) => Ok(Value::Symbol(s.clone())),
            other => Err(wrong_type(&self.name, other)),
        }
    }
}

impl AttributeHandler for EnumHandler {
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
            Value::Symbol(s) => JsonValue::String(s),
            _ => JsonValue::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use crate::model::Scalar;

    #[test]
    fn test_strings_become_symbols() {
        let handler = EnumHandler::new("gender", Options::new()).unwrap();
        assert_eq!(handler.from_value(Value::from("female")).unwrap(), Value::symbol("female"));
        assert_eq!(handler.from_value(Value::from("")).unwrap(), Value::Null);
        assert_eq!(handler.to_store(&Value::symbol("male")).unwrap(), JsonValue::from("male"));
        assert_eq!(handler.from_store(&JsonValue::from("male")).unwrap(), Value::symbol("male"));
    }

    #[test]
    fn test_limit() {
        let options = Options::new().limit(vec![Scalar::symbol("male"), Scalar::symbol("female")]);
        let handler = EnumHandler::new("gender", options).unwrap();
        assert!(handler.validation_errors(&Value::symbol("female")).is_empty());
        assert_eq!(handler.validation_errors(&Value::symbol("other")).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_store_round_trip(name in "[a-z][a-z_]{0,11}") {
            let handler = EnumHandler::new("gender", Options::new()).unwrap();
            let value = handler.from_value(Value::from(name.as_str())).unwrap();
            let back = handler.from_store(&handler.to_store(&value).unwrap()).unwrap();
            prop_assert_eq!(back, value);
        }
    }
}
