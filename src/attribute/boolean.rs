//! Boolean attributes.

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options};
use crate::model::Value;
use crate::Result;

/// Strings that coerce to `true`; every other non-blank string is `false`.
const TRUE_STRINGS: &[&str] = &["1", "t", "T", "true", "TRUE"];

#[derive(Debug)]
pub struct BooleanHandler {
    name: String,
    options: Options,
}

impl BooleanHandler {
    pub fn new(name: &str, options: Options) -> Result<Self> {
        options.assert_valid_keys("boolean", name, &[])?;
        Ok(Self { name: name.to_owned(), options })
    }

    fn coerce(value: &Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::Bool(b) => Value::Bool(*b),
            Value::String(s) if s.trim().is_empty() => Value::Null,
            Value::String(s) => Value::Bool(TRUE_STRINGS.contains(&s.as_str())),
            _ => Value::Bool(true),
        }
    }
}

impl AttributeHandler for BooleanHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        Ok(Self::coerce(&value))
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        Ok(Self::coerce(&Value::from(stored.clone())))
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        Ok(match Self::coerce(value) {
            Value::Bool(b) => JsonValue::Bool(b),
            _ => JsonValue::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_string_coercion() {
        let handler = BooleanHandler::new("color", Options::new()).unwrap();
        for truthy in TRUE_STRINGS {
            assert_eq!(handler.from_value(Value::from(*truthy)).unwrap(), Value::Bool(true));
        }
        for falsy in ["0", "f", "false", "no"] {
            assert_eq!(handler.from_value(Value::from(falsy)).unwrap(), Value::Bool(false));
        }
        assert_eq!(handler.from_value(Value::from("  ")).unwrap(), Value::Null);
    }

    #[test]
    fn test_truthiness_of_other_values() {
        let handler = BooleanHandler::new("color", Options::new()).unwrap();
        assert_eq!(handler.from_value(Value::Int(0)).unwrap(), Value::Bool(true));
        assert_eq!(handler.from_value(Value::Float(0.0)).unwrap(), Value::Bool(true));
        assert_eq!(handler.from_value(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn test_store() {
        let handler = BooleanHandler::new("color", Options::new()).unwrap();
        assert_eq!(handler.to_store(&Value::Bool(false)).unwrap(), JsonValue::Bool(false));
        assert_eq!(handler.from_store(&JsonValue::Bool(true)).unwrap(), Value::Bool(true));
    }

    proptest! {
        #[test]
        fn prop_store_round_trip(x in proptest::option::of(any::<bool>())) {
            let handler = BooleanHandler::new("color", Options::new()).unwrap();
            let value = handler.from_value(x.map_or(Value::Null, Value::Bool)).unwrap();
            let back = handler.from_store(&handler.to_store(&value).unwrap()).unwrap();
            prop_assert_eq!(back, value);
        }
    }
}
