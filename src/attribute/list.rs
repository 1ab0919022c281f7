//! Has-many attributes: lists handled element-wise by an inner handler.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options, ValidationErrors};
use crate::model::Value;
use crate::{Error, Result};

#[derive(Debug)]
pub struct ListHandler {
    name: String,
    options: Options,
    element: Arc<dyn AttributeHandler>,
}

impl ListHandler {
    pub const OPTIONS: &'static [&'static str] = &["collapse_errors"];

    pub fn new(name: &str, element: Arc<dyn AttributeHandler>, options: Options) -> Result<Self> {
        options.assert_valid_keys("list", name, Self::OPTIONS)?;
        Ok(Self { name: name.to_owned(), options, element })
    }

    pub fn element(&self) -> &Arc<dyn AttributeHandler> { &self.element }

    fn wrong_type(&self, value: &Value) -> Error {
        Error::WrongType { attribute: self.name.clone(), value: value.inspect() }
    }
}

impl AttributeHandler for ListHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::List(Vec::new())),
            Value::List(items) => items
                .into_iter()
                .map(|item| self.element.from_value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(self.wrong_type(&other)),
        }
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        match stored {
            JsonValue::Null => Ok(Value::List(Vec::new())),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| self.element.from_store(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            other => Err(self.wrong_type(&Value::from(other.clone()))),
        }
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::Null => Ok(JsonValue::Array(Vec::new())),
            Value::List(items) => items
                .iter()
                .map(|item| self.element.to_store(item))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array),
            other => Err(self.wrong_type(other)),
        }
    }

    fn default(&self) -> Value {
        Value::List(Vec::new())
    }

    fn force_validation(&self) -> bool {
        self.element.force_validation()
    }

    /// Element errors, deduplicated, with `collapse_errors`; otherwise a
    /// single "is invalid" when any element has errors.
    fn validation_errors(&self, value: &Value) -> ValidationErrors {
        let items = value.as_list().unwrap_or_default();
        let mut contained: Vec<String> = Vec::new();
        for item in items {
            for message in self.element.validation_errors(item) {
                if !contained.contains(&message) {
                    contained.push(message);
                }
            }
        }

        if self.options.collapse_errors {
            contained.into_iter().collect()
        } else if contained.is_empty() {
            ValidationErrors::new()
        } else {
            ValidationErrors::from_iter(["is invalid".to_owned()])
        }
    }

    fn assign_saved_changes(&self, value: &Value) -> Result<()> {
        for item in value.as_list().unwrap_or_default() {
            self.element.assign_saved_changes(item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::string::StringHandler;

    fn list(options: Options) -> ListHandler {
        let element = StringHandler::new("names", Options::new().size(3)).unwrap();
        ListHandler::new("names", Arc::new(element), options).unwrap()
    }

    #[test]
    fn test_element_wise_conversion() {
        let handler = list(Options::new());
        let value = handler.from_value(Value::from(vec![Value::Int(1), Value::from("b")])).unwrap();
        assert_eq!(value, Value::from(vec!["1", "b"]));
        assert_eq!(handler.to_store(&value).unwrap(), serde_json::json!(["1", "b"]));
        assert_eq!(handler.from_value(Value::Null).unwrap(), Value::List(vec![]));
    }

    #[test]
    fn test_non_list_is_rejected() {
        let handler = list(Options::new());
        let err = handler.from_value(Value::from("nope")).unwrap_err();
        assert!(matches!(err, Error::WrongType { .. }));
        assert!(handler.from_store(&serde_json::json!({"a": 1})).is_err());
    }

    #[test]
    fn test_errors_are_summarized() {
        let handler = list(Options::new());
        let value = Value::from(vec!["abcd", "efgh"]);
        assert_eq!(handler.validation_errors(&value).as_slice(), ["is invalid"]);
        assert!(handler.validation_errors(&Value::from(vec!["ok"])).is_empty());
    }

    #[test]
    fn test_errors_are_collapsed_and_deduplicated() {
        let handler = list(Options::new().collapse_errors());
        let value = Value::from(vec!["abcd", "efgh"]);
        assert_eq!(
            handler.validation_errors(&value).as_slice(),
            ["is too long (maximum is 3 characters)"]
        );
    }
}
