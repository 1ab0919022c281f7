//! Nested aggregate attributes.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{AttributeHandler, Options, ValidationErrors, common_validation, wrong_type};
use crate::model::Value;
use crate::store::{Aggregate, Schema};
use crate::Result;

#[derive(Debug)]
pub struct NestedHandler {
    name: String,
    options: Options,
    schema: Arc<Schema>,
}

impl NestedHandler {
    pub fn new(name: &str, schema: Arc<Schema>, options: Options) -> Result<Self> {
        options.assert_valid_keys("nested", name, &[])?;
        Ok(Self { name: name.to_owned(), options, schema })
    }

    pub fn schema(&self) -> &Arc<Schema> { &self.schema }
}

impl AttributeHandler for NestedHandler {
    fn name(&self) -> &str { &self.name }
    fn options(&self) -> &Options { &self.options }

    fn from_value(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Aggregate(aggregate) if aggregate.schema().is_a(&self.schema) => {
                Ok(Value::Aggregate(aggregate))
            }
            Value::Map(map) => Aggregate::from_map(&self.schema, &map).map(Value::Aggregate),
            other => Err(wrong_type(&self.name, &other)),
        }
    }

    fn from_store(&self, stored: &JsonValue) -> Result<Value> {
        match stored {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Object(map) => Ok(Value::Aggregate(Aggregate::from_store(&self.schema, map.clone()))),
            other => Err(wrong_type(&self.name, &Value::from(other.clone()))),
        }
    }

    fn to_store(&self, value: &Value) -> Result<JsonValue> {
        match value {
            Value::Null => Ok(JsonValue::Null),
            Value::Aggregate(aggregate) => aggregate.to_store().map(JsonValue::Object),
            other => Err(wrong_type(&self.name, other)),
        }
    }

    /// `Null` builds an empty aggregate; a map builds one with those attributes.
    fn build(&self, args: Value) -> Result<Value> {
        match args {
            Value::Null => Ok(Value::Aggregate(Aggregate::new(&self.schema))),
            Value::Map(map) => Aggregate::from_map(&self.schema, &map).map(Value::Aggregate),
            other => self.from_value(other),
        }
    }

    /// Nested errors are flattened into `"<Field> <message>"` entries.
    fn validation_errors(&self, value: &Value) -> ValidationErrors {
        let mut errors = common_validation(&self.options, value);
        if let Value::Aggregate(aggregate) = value {
            match aggregate.validate() {
                Ok(true) => {}
                Ok(false) => errors.extend(aggregate.errors().full_messages()),
                Err(e) => errors.push(format!("could not be validated ({e})")),
            }
        }
        errors
    }

    fn assign_saved_changes(&self, value: &Value) -> Result<()> {
        match value {
            Value::Aggregate(aggregate) => aggregate.finalize_commit(),
            _ => Ok(()),
        }
    }
}
